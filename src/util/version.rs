pub const APP_NAME: &str = "Item Value Proxy";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_TAG: Option<&str> = option_env!("GIT_TAG");

const USER_AGENT_PRODUCT: &str = "item-value-proxy";

pub fn version_label() -> String {
    if let Some(tag) = GIT_TAG {
        tag.to_string()
    } else {
        format!("v{}", APP_VERSION)
    }
}

/// User agent sent with every upstream request.
pub fn user_agent() -> String {
    format!(
        "{}/{}",
        USER_AGENT_PRODUCT,
        version_label().trim_start_matches(|ch| ch == 'v' || ch == 'V')
    )
}

pub fn banner() -> String {
    format!("{} {} running", APP_NAME, version_label())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_carries_a_version() {
        let label = version_label();
        assert!(label.starts_with('v') || GIT_TAG.is_some());
        assert!(!label.is_empty());
    }

    #[test]
    fn user_agent_drops_the_v_prefix() {
        let agent = user_agent();
        assert!(agent.starts_with("item-value-proxy/"));
        assert!(!agent.contains("/v"));
    }
}
