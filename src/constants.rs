//! # System Constants
//!
//! Parameter names, defaults and journal format markers shared across the crate.

/// Query descriptor parameter names understood by the more-like-this handler
pub mod params {
    pub const QUERY_TYPE: &str = "qt";
    pub const FIELD_LIST: &str = "fl";
    pub const ROWS: &str = "rows";
    pub const MIN_DOC_FREQ: &str = "mlt.mindf";
    pub const MIN_TERM_FREQ: &str = "mlt.mintf";
    pub const BOOST: &str = "mlt.boost";
    pub const SIMILARITY_FIELDS: &str = "mlt.fl";

    /// Request handler path for more-like-this queries
    pub const MLT_HANDLER: &str = "/mlt";
    /// Only the relevance score is requested back per candidate
    pub const SCORE_FIELD: &str = "score";
}

/// Matcher defaults
pub mod defaults {
    pub const SERVER_URL: &str = "http://localhost:8983/solr";
    pub const MIN_DOC_FREQ: u32 = 1;
    pub const MIN_TERM_FREQ: u32 = 1;
    pub const BOOST_INTERESTING_TERMS: bool = true;
    pub const ROWS: u32 = 1;
    pub const CONCURRENCY: usize = 4;

    pub const SIMILARITY_FIELDS: &[&str] = &[
        "collectors",
        "collector_number",
        "location",
        "date_collected",
        "date_split",
        "scientific_name",
    ];
}

/// Journal line format
pub mod journal {
    pub const FIELD_SEPARATOR: char = '\t';
    pub const LINE_TERMINATOR: char = '\n';
    pub const FIELDS_PER_ENTRY: usize = 3;
}

/// Environment variable names
pub mod env {
    pub const ENVIRONMENT: &str = "BATCHMATCH_ENV";
    pub const FALLBACK_ENVIRONMENT: &str = "APP_ENV";
    pub const CONFIG_PREFIX: &str = "BATCHMATCH";
    pub const CONFIG_SEPARATOR: &str = "__";
}
