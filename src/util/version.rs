pub const APP_NAME: &str = "Salvage Advisor";
pub const APP_AUTHOR: &str = "SetScallywag";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_TAG: Option<&str> = option_env!("GIT_TAG");

pub fn version_label() -> String {
    if let Some(tag) = GIT_TAG {
        tag.to_string()
    } else {
        format!("v{}", APP_VERSION)
    }
}

/// GitHub rejects API calls without a user agent.
pub fn user_agent() -> String {
    format!("{}/{}", APP_NAME, version_label())
}

pub fn about() -> String {
    format!("{APP_NAME} {} by {APP_AUTHOR}", version_label())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_is_name_and_version() {
        let agent = user_agent();
        assert_eq!(agent, format!("Salvage Advisor/{}", version_label()));
        assert!(!agent.contains("http"));
        assert!(version_label().starts_with('v') || GIT_TAG.is_some());
    }
}
