pub const SCHEMA: &str = r#"
-- Images: one row per file held in managed storage
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    original_path TEXT NOT NULL,           -- Source path or remote URL at import time
    stored_path TEXT NOT NULL UNIQUE,      -- Relative to the data directory
    thumbnail_path TEXT,                   -- Relative to the data directory
    filename TEXT NOT NULL,                -- Display name without extension
    extension TEXT NOT NULL DEFAULT '',    -- Leading dot included, may be empty
    imported_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    imported_from TEXT                     -- 'local' or 'google_photos'
);

CREATE INDEX IF NOT EXISTS idx_images_imported_at ON images(imported_at);

-- Tags: created lazily, never removed automatically
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS image_tags (
    image_id INTEGER,
    tag_id INTEGER,
    PRIMARY KEY (image_id, tag_id),
    FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_image_tags_tag ON image_tags(tag_id);

CREATE TABLE IF NOT EXISTS albums (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS album_images (
    album_id INTEGER,
    image_id INTEGER,
    PRIMARY KEY (album_id, image_id),
    FOREIGN KEY (album_id) REFERENCES albums(id) ON DELETE CASCADE,
    FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_album_images_image ON album_images(image_id);
"#;

/// Columns added after the first release, as (column, ALTER statement).
/// Applied only when the column is missing.
pub const COLUMN_MIGRATIONS: &[(&str, &str)] = &[
    ("thumbnail_path", "ALTER TABLE images ADD COLUMN thumbnail_path TEXT"),
    (
        "extension",
        "ALTER TABLE images ADD COLUMN extension TEXT NOT NULL DEFAULT ''",
    ),
];
