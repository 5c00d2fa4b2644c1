use pkg_types::environment::{Role, User};
use pkg_types::rbac::Subject;

/// Users split into the two access tiers bound in every environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPartition {
    pub admins: Vec<Subject>,
    pub viewers: Vec<Subject>,
}

/// Classify users by role in a single stable pass.
///
/// `admin` goes to admins and `viewer` to viewers. `dev` is an admin outside
/// production and gets no binding in production. Any other role is dropped.
/// Input order and duplicates are preserved.
pub fn partition_users(users: &[User], is_prod: bool) -> AccessPartition {
    let mut partition = AccessPartition::default();
    for user in users {
        match user.role() {
            Some(Role::Admin) => partition.admins.push(Subject::user(&user.username)),
            Some(Role::Dev) if !is_prod => partition.admins.push(Subject::user(&user.username)),
            Some(Role::Viewer) => partition.viewers.push(Subject::user(&user.username)),
            Some(Role::Dev) | None => {}
        }
    }
    partition
}
