use anyhow::{Result, bail};

/// Validate a Kubernetes-style resource name.
/// Rules: lowercase `[a-z0-9-]`, max 63 chars, no leading/trailing hyphens.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("name must not be empty");
    }
    if name.len() > 63 {
        bail!("name '{}' exceeds 63 characters (got {})", name, name.len());
    }
    if name.starts_with('-') || name.ends_with('-') {
        bail!("name '{}' must not start or end with a hyphen", name);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        bail!(
            "name '{}' must contain only lowercase letters, digits, and hyphens [a-z0-9-]",
            name
        );
    }
    Ok(())
}

const BINARY_SI: &[&str] = &["Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];
const DECIMAL_SI: &[&str] = &["n", "u", "m", "k", "M", "G", "T", "P", "E"];

/// Validate a resource quantity such as `500m`, `1.5Gi`, `10` or `1e3`.
///
/// Grammar: `[+-]<number><suffix>` where number is `d`, `d.d`, `d.` or `.d`
/// and suffix is empty, a binary SI suffix (`Ki`..`Ei`), a decimal SI
/// suffix (`n`, `u`, `m`, `k`, `M`..`E`) or a decimal exponent (`e3`, `E-2`).
pub fn validate_quantity(quantity: &str) -> Result<()> {
    if quantity.is_empty() {
        bail!("quantity must not be empty");
    }
    let unsigned = quantity.strip_prefix(['+', '-']).unwrap_or(quantity);

    let number_len = unsigned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(number_len);

    let mut parts = number.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();
    let valid_number = match fraction {
        None => !whole.is_empty(),
        Some(frac) => !frac.contains('.') && (!whole.is_empty() || !frac.is_empty()),
    };
    if !valid_number {
        bail!("quantity '{}' must start with a number", quantity);
    }

    if suffix.is_empty() || BINARY_SI.contains(&suffix) || DECIMAL_SI.contains(&suffix) {
        return Ok(());
    }
    if let Some(exponent) = suffix.strip_prefix(['e', 'E']) {
        let digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            return Ok(());
        }
    }
    bail!(
        "quantity '{}' has an unrecognised suffix '{}'",
        quantity,
        suffix
    )
}
