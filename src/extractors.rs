//! Request extractors shared by the controllers.
//!
//! - `ValidatedJson<T>`: JSON body that has passed its `validator` rules.
//! - `Pagination`: `page` / `page_size` from the query string, plus what is
//!   needed to render `next` / `previous` links.

use axum::{
    extract::{FromRequest, FromRequestParts, OriginalUri, Request},
    http::request::Parts,
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use validator::Validate;

use crate::error::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

#[derive(Debug, Clone)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    path: String,
    query: Vec<(String, String)>,
}

/// One page of a list endpoint.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<S> FromRequestParts<S> for Pagination
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Вложенные роутеры обрезают префикс, ссылки строим по исходному пути
        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map(|uri| uri.0.path().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        Pagination::parse(path, parts.uri.query().unwrap_or_default())
    }
}

impl Pagination {
    pub fn parse(path: String, raw_query: &str) -> Result<Self, AppError> {
        let query: Vec<(String, String)> = serde_urlencoded::from_str(raw_query)
            .map_err(|_| AppError::bad_request("Malformed query string."))?;

        let lookup = |name: &str| {
            query
                .iter()
                .rev()
                .find(|(k, v)| k == name && !v.is_empty())
                .map(|(_, v)| v.as_str())
        };

        let page = match lookup("page") {
            Some(raw) => positive(raw).ok_or_else(|| AppError::field("page", "Invalid page."))?,
            None => 1,
        };
        let page_size = match lookup("page_size") {
            Some(raw) => positive(raw)
                .ok_or_else(|| AppError::field("page_size", "A positive integer is required."))?
                .min(MAX_PAGE_SIZE),
            None => DEFAULT_PAGE_SIZE,
        };

        // OFFSET должен помещаться в i64
        if (page - 1).checked_mul(page_size).is_none() {
            return Err(AppError::field("page", "Invalid page."));
        }

        Ok(Pagination { page, page_size, path, query })
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Stable description of the requested window, used in cache keys.
    ///
    /// Includes every parameter `next`/`previous` links are built from, so a
    /// cached page never carries links from a different query string.
    pub fn cache_fragment(&self) -> String {
        format!(
            "p={}&ps={}&q={}",
            self.page,
            self.page_size,
            serde_urlencoded::to_string(self.link_params()).unwrap_or_default()
        )
    }

    pub fn into_page<T>(self, results: Vec<T>, count: i64) -> Page<T> {
        let next = (self.offset().saturating_add(self.page_size) < count)
            .then(|| self.link(self.page + 1));
        let previous = (self.page > 1).then(|| self.link(self.page - 1));
        Page { count, next, previous, results }
    }

    fn link_params(&self) -> Vec<(&str, String)> {
        self.query
            .iter()
            .filter(|(k, _)| k != "page")
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect()
    }

    fn link(&self, page: i64) -> String {
        let mut pairs = self.link_params();
        if page > 1 {
            pairs.push(("page", page.to_string()));
        }
        match serde_urlencoded::to_string(&pairs) {
            Ok(qs) if !qs.is_empty() => format!("{}?{}", self.path, qs),
            _ => self.path.clone(),
        }
    }
}

fn positive(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|n| *n >= 1)
}
