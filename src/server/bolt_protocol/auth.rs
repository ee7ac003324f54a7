//! HELLO/LOGON handling (§1 Non-goals: "authentication policy...credentials
//! are accepted and ignored"). The server records the driver's `user_agent`
//! for diagnostics but never rejects a credential.

use crate::packstream::Value;

#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub user_agent: Option<String>,
}

impl AuthContext {
    /// `HELLO`/`LOGON` auth maps are accepted unconditionally; only
    /// `user_agent` is kept.
    pub fn accept(extra: Option<&Value>) -> AuthContext {
        let user_agent = extra.and_then(|v| v.map_get("user_agent")).and_then(Value::as_str).map(str::to_string);
        AuthContext { user_agent }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_credentials_are_accepted() {
        let extra = Value::Map(vec![
            ("user_agent".to_string(), Value::String("neo4j-python/5.0".to_string())),
            ("scheme".to_string(), Value::String("basic".to_string())),
            ("principal".to_string(), Value::String("nonexistent-user".to_string())),
            ("credentials".to_string(), Value::String("wrong-password".to_string())),
        ]);
        let ctx = AuthContext::accept(Some(&extra));
        assert_eq!(ctx.user_agent, Some("neo4j-python/5.0".to_string()));
    }

    #[test]
    fn missing_extra_map_does_not_panic() {
        let ctx = AuthContext::accept(None);
        assert_eq!(ctx.user_agent, None);
    }
}
