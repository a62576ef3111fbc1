// SQL query constants for repositories
// Centralizes repeated SELECT column lists

/// SQL query fragments for the todos table
pub mod todo_queries {
    /// All columns for todos, in `Todo` field order
    pub const SELECT_ALL_COLUMNS: &str =
        "id, user_id, title, description, completed, created_at, updated_at";

    /// Todo columns of alias `t` plus owner columns of alias `u`.
    ///
    /// Owner columns are prefixed so they do not collide with the todo's own `id`.
    pub const SELECT_WITH_OWNER_COLUMNS: &str = r#"t.id, t.user_id, t.title, t.description,
        t.completed, t.created_at, t.updated_at,
        u.id AS owner_id, u.username AS owner_username,
        u.email AS owner_email, u.full_name AS owner_full_name"#;
}

/// SQL query fragments for the users table
pub mod user_queries {
    /// All columns for users table
    pub const SELECT_ALL_COLUMNS: &str = "id, username, email, full_name, is_active";
}
