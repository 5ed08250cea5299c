//! Article content scraping.
//!
//! The dataset CSV may arrive with empty `content` columns; the scraper fills
//! them by fetching each row's link and extracting the article body from the
//! page HTML.
//!
//! Currently one source is supported:
//!
//! | Source | Module | Method |
//! |--------|--------|--------|
//! | Hankook Ilbo | [`hankookilbo`] | HTML scraping of `p.editor-p` paragraphs |

pub mod hankookilbo;
