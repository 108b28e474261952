use rusqlite::{params, Connection};

/// Lowercase, hyphen-separated form of `text`. Never empty.
pub fn slugify(text: &str) -> String {
    let s = slug::slugify(text);
    if s.is_empty() {
        "untitled".to_string()
    } else {
        s
    }
}

/// Tables whose `slug` column is kept unique through numeric suffixes.
#[derive(Debug, Clone, Copy)]
pub enum SlugTable {
    Posts,
    Pages,
    Categories,
    Tags,
}

impl SlugTable {
    fn name(self) -> &'static str {
        match self {
            SlugTable::Posts => "posts",
            SlugTable::Pages => "pages",
            SlugTable::Categories => "categories",
            SlugTable::Tags => "tags",
        }
    }
}

/// Returns `base` if free, otherwise `base-1`, `base-2`, ...
/// The row `exclude_id` (the one being updated) never collides with itself.
pub fn unique_slug(
    conn: &Connection,
    table: SlugTable,
    base: &str,
    exclude_id: Option<i64>,
) -> Result<String, String> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE slug = ?1 AND id != ?2",
        table.name()
    );
    let exclude = exclude_id.unwrap_or(-1);

    let taken = |candidate: &str| -> Result<bool, String> {
        conn.query_row(&sql, params![candidate, exclude], |row| row.get::<_, i64>(0))
            .map(|n| n > 0)
            .map_err(|e| e.to_string())
    };

    if !taken(base)? {
        return Ok(base.to_string());
    }
    let mut counter = 1;
    loop {
        let candidate = format!("{}-{}", base, counter);
        if !taken(&candidate)? {
            return Ok(candidate);
        }
        counter += 1;
    }
}
