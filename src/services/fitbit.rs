// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit Web API client.
//!
//! Handles:
//! - Profile lookup (for the `memberSince` date)
//! - Sleep logs for a single day or a date range
//! - Surfacing non-2xx statuses as numeric codes for classification upstream

use crate::ports::{HttpFailure, SleepApi};
use crate::time_utils::format_sleep_date;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Method, StatusCode};
use std::time::Duration;

/// One outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Scheme and authority, e.g. `https://api.fitbit.com`
    pub host: String,
    pub path: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(host: &str, path: String) -> Self {
        Self {
            host: host.to_string(),
            path,
            method: Method::GET,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.headers
            .push(("Authorization".to_string(), format!("Bearer {}", token)));
        self
    }
}

/// Generic HTTP invocation: body text on 2xx, the status code otherwise.
#[derive(Clone)]
pub struct HttpInvoker {
    http: reqwest::Client,
}

impl HttpInvoker {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    pub async fn call(&self, request: HttpRequest) -> Result<String, HttpFailure> {
        let url = format!("{}{}", request.host.trim_end_matches('/'), request.path);

        let mut builder = self.http.request(request.method, &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| HttpFailure::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::TOO_MANY_REQUESTS {
                tracing::warn!(path = %request.path, "Fitbit rate limit hit (429)");
            } else {
                tracing::debug!(path = %request.path, status = status.as_u16(), "Fitbit request failed");
            }
            return Err(HttpFailure::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| HttpFailure::Network(format!("Failed to read body: {}", e)))
    }
}

/// Fitbit API client.
#[derive(Clone)]
pub struct FitbitClient {
    invoker: HttpInvoker,
    base_url: String,
}

impl FitbitClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            invoker: HttpInvoker::new(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, token: &str, path: String) -> Result<String, HttpFailure> {
        self.invoker
            .call(HttpRequest::get(&self.base_url, path).bearer(token))
            .await
    }
}

#[async_trait]
impl SleepApi for FitbitClient {
    async fn get_profile(&self, token: &str, user_id: &str) -> Result<String, HttpFailure> {
        self.get(token, profile_path(user_id)).await
    }

    async fn get_day(
        &self,
        token: &str,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<String, HttpFailure> {
        self.get(token, sleep_day_path(user_id, date)).await
    }

    async fn get_range(
        &self,
        token: &str,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<String, HttpFailure> {
        self.get(token, sleep_range_path(user_id, start, end)).await
    }
}

fn profile_path(user_id: &str) -> String {
    format!("/1/user/{}/profile.json", urlencoding::encode(user_id))
}

fn sleep_day_path(user_id: &str, date: NaiveDate) -> String {
    format!(
        "/1.2/user/{}/sleep/date/{}.json",
        urlencoding::encode(user_id),
        format_sleep_date(date)
    )
}

fn sleep_range_path(user_id: &str, start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "/1.2/user/{}/sleep/date/{}/{}.json",
        urlencoding::encode(user_id),
        format_sleep_date(start),
        format_sleep_date(end)
    )
}
