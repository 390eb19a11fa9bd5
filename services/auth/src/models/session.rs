//! Session model and related functionality

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// The single live session of an account
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub account_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub expiry: DateTime<Utc>,
}

impl Session {
    /// Whether the session is past its expiry at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expiry: now,
        };

        assert!(session.is_expired_at(now));
        assert!(session.is_expired_at(now + Duration::seconds(1)));
        assert!(!session.is_expired_at(now - Duration::seconds(1)));
    }
}
