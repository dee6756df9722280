use crate::error::{IflowError, IflowErrorLocation, Result};

/// Turn a process name into a bundle symbolic name that is also safe as a file stem inside the
/// archive. Rejects names with nothing usable left and anything that would escape via `..`.
pub fn bundle_name(raw: &str) -> Result<String> {
    safe_stem(raw).ok_or_else(|| IflowError::Package {
        message: format!("'{raw}' cannot be used as a bundle name"),
        location: IflowErrorLocation::at_path("process_name"),
    })
}

/// File name for a bundled resource: the last path segment of `raw`, made safe, with `ext`.
pub fn resource_file_name(raw: &str, ext: &str) -> Result<String> {
    let segment = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = segment.strip_suffix(&format!(".{ext}")).unwrap_or(segment);
    let stem = safe_stem(stem).ok_or_else(|| IflowError::Package {
        message: format!("'{raw}' cannot be used as a resource file name"),
        location: IflowErrorLocation::at_path("resources"),
    })?;
    Ok(format!("{stem}.{ext}"))
}

fn safe_stem(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    let name = out.trim_matches(|c| c == '_' || c == '.').to_string();
    (!name.is_empty() && !name.contains("..")).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaces_and_symbols_collapse_to_underscores() {
        assert_eq!(bundle_name("Order Sync / v2").unwrap(), "Order_Sync_v2");
        assert_eq!(bundle_name("  SF.Employees ").unwrap(), "SF.Employees");
    }

    #[test]
    fn traversal_and_empty_names_are_rejected() {
        assert!(bundle_name("../etc").is_ok_and(|n| n == "etc"));
        assert!(bundle_name("a..b").is_err());
        assert!(bundle_name(" /// ").is_err());
    }

    #[test]
    fn resource_names_keep_only_the_last_segment() {
        assert_eq!(resource_file_name("scripts/Map Order", "groovy").unwrap(), "Map_Order.groovy");
        assert_eq!(resource_file_name("..\\..\\evil.groovy", "groovy").unwrap(), "evil.groovy");
        assert_eq!(resource_file_name("accounts", "edmx").unwrap(), "accounts.edmx");
        assert!(resource_file_name("scripts/..", "groovy").is_err());
    }
}
