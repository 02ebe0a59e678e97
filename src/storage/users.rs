//! Users, preferences, alerts and the audit trail

use super::Database;
use crate::error::{Error, Result};
use crate::model::{
    Alert, AlertSeverity, AuditEntry, PreferencesUpdate, Role, User, UserPreferences,
};
use chrono::Utc;
use rusqlite::{params, params_from_iter, OptionalExtension, Row, ToSql};

impl Database {
    // ==================== Users ====================

    /// Create a user together with default preferences
    pub fn create_user(&self, username: &str, email: &str, role: Role) -> Result<i64> {
        if username.trim().is_empty() || email.trim().is_empty() {
            return Err(Error::validation("username and email are required"));
        }

        let tx = self.transaction()?;
        tx.execute(
            "INSERT INTO users (username, email, role, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![username.trim(), email.trim(), role.as_str(), Utc::now()],
        )?;
        let user_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO user_preferences (user_id, theme) VALUES (?1, 'dark')",
            params![user_id],
        )?;
        tx.commit()?;

        Ok(user_id)
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, username, email, role FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()?;

        Ok(user)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, username, email, role FROM users WHERE username = ?1",
                params![username],
                user_from_row,
            )
            .optional()?;

        Ok(user)
    }

    /// Get all users ordered by username
    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, username, email, role FROM users ORDER BY username")?;

        let rows = stmt.query_map([], user_from_row)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }

        Ok(users)
    }

    /// Users holding any of the given roles, in ID order
    pub fn users_with_roles(&self, roles: &[Role]) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .list_users()?
            .into_iter()
            .filter(|u| roles.contains(&u.role))
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    pub fn update_user_role(&self, user_id: i64, role: Role) -> Result<()> {
        let count = self.conn.execute(
            "UPDATE users SET role = ?1 WHERE id = ?2",
            params![role.as_str(), user_id],
        )?;
        if count == 0 {
            return Err(Error::not_found("user", user_id));
        }
        Ok(())
    }

    // ==================== Preferences ====================

    pub fn get_user_preferences(&self, user_id: i64) -> Result<Option<UserPreferences>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT user_id, theme, alerts_enabled, email_notifications,
                       saved_filters, saved_dashboards
                FROM user_preferences WHERE user_id = ?1
                "#,
                params![user_id],
                |row| {
                    Ok(PreferencesRow {
                        user_id: row.get(0)?,
                        theme: row.get(1)?,
                        alerts_enabled: row.get(2)?,
                        email_notifications: row.get(3)?,
                        saved_filters: row.get(4)?,
                        saved_dashboards: row.get(5)?,
                    })
                },
            )
            .optional()?;

        row.map(PreferencesRow::into_preferences).transpose()
    }

    /// Apply the fields set in `update`; unset fields keep their value
    pub fn update_user_preferences(&self, user_id: i64, update: &PreferencesUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        let mut assignments = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(theme) = &update.theme {
            assignments.push("theme = ?");
            values.push(Box::new(theme.clone()));
        }
        if let Some(enabled) = update.alerts_enabled {
            assignments.push("alerts_enabled = ?");
            values.push(Box::new(enabled));
        }
        if let Some(enabled) = update.email_notifications {
            assignments.push("email_notifications = ?");
            values.push(Box::new(enabled));
        }
        if let Some(filters) = &update.saved_filters {
            assignments.push("saved_filters = ?");
            values.push(Box::new(serde_json::to_string(filters)?));
        }
        if let Some(dashboards) = &update.saved_dashboards {
            assignments.push("saved_dashboards = ?");
            values.push(Box::new(serde_json::to_string(dashboards)?));
        }
        values.push(Box::new(user_id));

        let sql = format!(
            "UPDATE user_preferences SET {} WHERE user_id = ?",
            assignments.join(", ")
        );
        let count = self.conn.execute(&sql, params_from_iter(values.iter()))?;
        if count == 0 {
            return Err(Error::not_found("user", user_id));
        }

        Ok(())
    }

    // ==================== Alerts ====================

    pub fn create_alert(
        &self,
        user_id: i64,
        alert_type: &str,
        title: &str,
        message: &str,
        severity: AlertSeverity,
    ) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO alerts (user_id, alert_type, title, message, severity, read, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
            "#,
            params![user_id, alert_type, title, message, severity.as_str(), Utc::now()],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent unread alerts of a user
    pub fn unread_alerts(&self, user_id: i64, limit: usize) -> Result<Vec<Alert>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, alert_type, title, message, severity, read, created_at
            FROM alerts WHERE user_id = ?1 AND read = 0
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![user_id, limit as i64], alert_from_row)?;

        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row?);
        }

        Ok(alerts)
    }

    /// Get every alert, oldest first
    pub fn list_alerts(&self) -> Result<Vec<Alert>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, alert_type, title, message, severity, read, created_at
            FROM alerts ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map([], alert_from_row)?;

        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row?);
        }

        Ok(alerts)
    }

    pub fn mark_alert_read(&self, alert_id: i64) -> Result<()> {
        let count = self
            .conn
            .execute("UPDATE alerts SET read = 1 WHERE id = ?1", params![alert_id])?;
        if count == 0 {
            return Err(Error::not_found("alert", alert_id));
        }
        Ok(())
    }

    // ==================== Audit ====================

    /// Append an entry to the audit trail
    pub fn log_action(
        &self,
        user_id: Option<i64>,
        action: &str,
        entity_type: Option<&str>,
        entity_id: Option<i64>,
        details: Option<&str>,
    ) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO audit_logs (user_id, action, entity_type, entity_id, details, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![user_id, action, entity_type, entity_id, details, Utc::now()],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent audit entries, newest first
    pub fn audit_log(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT al.id, u.username, al.action, al.entity_type, al.entity_id, al.details, al.created_at
            FROM audit_logs al
            LEFT JOIN users u ON al.user_id = u.id
            ORDER BY al.created_at DESC, al.id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(AuditEntry {
                id: row.get(0)?,
                username: row.get(1)?,
                action: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                details: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }

        Ok(entries)
    }
}

// Internal row type for preferences mapping

struct PreferencesRow {
    user_id: i64,
    theme: String,
    alerts_enabled: bool,
    email_notifications: bool,
    saved_filters: Option<String>,
    saved_dashboards: Option<String>,
}

impl PreferencesRow {
    fn into_preferences(self) -> Result<UserPreferences> {
        let saved_filters = self
            .saved_filters
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let saved_dashboards = self
            .saved_dashboards
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(UserPreferences {
            user_id: self.user_id,
            theme: self.theme,
            alerts_enabled: self.alerts_enabled,
            email_notifications: self.email_notifications,
            saved_filters,
            saved_dashboards,
        })
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        role: role.parse().unwrap_or(Role::SalesRep),
    })
}

fn alert_from_row(row: &Row<'_>) -> rusqlite::Result<Alert> {
    let severity: String = row.get(5)?;
    Ok(Alert {
        id: row.get(0)?,
        user_id: row.get(1)?,
        alert_type: row.get(2)?,
        title: row.get(3)?,
        message: row.get(4)?,
        severity: AlertSeverity::from_db(&severity),
        read: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_gets_default_preferences() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_user("alice", "alice@example.com", Role::Manager).unwrap();

        let prefs = db.get_user_preferences(id).unwrap().unwrap();
        assert_eq!(prefs.theme, "dark");
        assert!(prefs.alerts_enabled);
        assert!(prefs.saved_filters.is_none());
    }

    #[test]
    fn test_partial_preferences_update() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_user("bob", "bob@example.com", Role::SalesRep).unwrap();

        db.update_user_preferences(
            id,
            &PreferencesUpdate {
                theme: Some("light".to_string()),
                saved_filters: Some(json!({"status": "sent"})),
                ..Default::default()
            },
        )
        .unwrap();

        let prefs = db.get_user_preferences(id).unwrap().unwrap();
        assert_eq!(prefs.theme, "light");
        assert!(prefs.email_notifications);
        assert_eq!(prefs.saved_filters, Some(json!({"status": "sent"})));

        let err = db
            .update_user_preferences(
                999,
                &PreferencesUpdate {
                    alerts_enabled: Some(false),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "user", id: 999 }));
    }

    #[test]
    fn test_alert_read_flag() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("carol", "carol@example.com", Role::Admin).unwrap();
        let first = db
            .create_alert(user, "system", "Hello", "First", AlertSeverity::Info)
            .unwrap();
        db.create_alert(user, "system", "Hello", "Second", AlertSeverity::Warning)
            .unwrap();

        assert_eq!(db.unread_alerts(user, 10).unwrap().len(), 2);
        db.mark_alert_read(first).unwrap();

        let unread = db.unread_alerts(user, 10).unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].message, "Second");
        assert_eq!(unread[0].severity, AlertSeverity::Warning);
    }

    #[test]
    fn test_audit_log_joins_username() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("dave", "dave@example.com", Role::Admin).unwrap();
        db.log_action(Some(user), "quote.created", Some("quote"), Some(1), None)
            .unwrap();
        db.log_action(None, "seed", None, None, Some("demo data")).unwrap();

        let entries = db.audit_log(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "seed");
        assert!(entries[0].username.is_none());
        assert_eq!(entries[1].username.as_deref(), Some("dave"));
    }

    #[test]
    fn test_users_with_roles() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("zed", "zed@example.com", Role::Admin).unwrap();
        db.create_user("amy", "amy@example.com", Role::SalesRep).unwrap();
        db.create_user("max", "max@example.com", Role::Viewer).unwrap();

        let managers = db.users_with_roles(&[Role::Admin, Role::Manager]).unwrap();
        assert_eq!(managers.len(), 1);
        assert_eq!(managers[0].username, "zed");
    }
}
