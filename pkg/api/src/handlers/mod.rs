pub mod children;
pub mod environments;
pub mod system;
pub mod watch;
