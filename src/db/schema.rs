pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- categories table (reference data, seeded out of band)
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE
);

-- articles table
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    lede TEXT,
    source_name TEXT NOT NULL,
    source_domain TEXT NOT NULL,
    image_url TEXT,
    published_at TEXT NOT NULL,
    category_id INTEGER NOT NULL REFERENCES categories(id),
    fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_articles_category_published ON articles(category_id, published_at DESC);
CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles(published_at DESC);

-- summaries table (at most one per article)
CREATE TABLE IF NOT EXISTS summaries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    article_id INTEGER NOT NULL UNIQUE REFERENCES articles(id) ON DELETE CASCADE,
    bullets TEXT NOT NULL,
    why_it_matters TEXT NOT NULL,
    model_version TEXT NOT NULL,
    quality_score REAL NOT NULL DEFAULT 0,
    generated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- feed_cache table (rewritten wholesale per category by the keeper)
CREATE TABLE IF NOT EXISTS feed_cache (
    category_id INTEGER NOT NULL REFERENCES categories(id),
    article_id INTEGER NOT NULL REFERENCES articles(id),
    rank INTEGER NOT NULL,
    PRIMARY KEY (category_id, rank)
);

-- likes table (maintained outside the pipeline)
CREATE TABLE IF NOT EXISTS likes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(article_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_likes_article_id ON likes(article_id);
"#;
