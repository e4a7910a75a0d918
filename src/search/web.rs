//! HTML search form served with axum.

use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, Redirect};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::fmt::Write;

use super::{classify, search, CommitHit, Database, SearchQuery, SearchResult};
use crate::db::{Author, Repository};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/search", get(search_get).post(search_post))
        .with_state(state)
}

async fn index() -> Redirect {
    Redirect::to("/search")
}

/// GET /search?query=...
async fn search_get(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Html<String>, (StatusCode, String)> {
    run_search(state, params).await
}

/// POST /search with a form-encoded `query`.
async fn search_post(
    State(state): State<AppState>,
    Form(params): Form<SearchParams>,
) -> Result<Html<String>, (StatusCode, String)> {
    run_search(state, params).await
}

async fn run_search(state: AppState, params: SearchParams) -> Result<Html<String>, (StatusCode, String)> {
    let query = params.query.unwrap_or_default();
    let classified = classify(&query);

    if classified == SearchQuery::TooShort {
        let warning = (!query.is_empty()).then_some("Valid search term should be longer than 4 characters");
        return Ok(Html(render_page(&query, warning, &SearchResult::default())));
    }

    tracing::debug!("search {:?}", classified);
    let db = state.db.clone();
    let result = tokio::task::spawn_blocking(move || -> anyhow::Result<SearchResult> {
        let store = db.open()?;
        Ok(search(&store, &classified)?)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Search task failed: {e}")))?
    .map_err(|e| {
        tracing::warn!("Search for {:?} failed: {:#}", query, e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Search failed".to_string())
    })?;

    Ok(Html(render_page(&query, None, &result)))
}

fn render_page(query: &str, warning: Option<&str>, result: &SearchResult) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Git Search</title>\n</head>\n<body>\n<h1>Git Search</h1>\n",
    );
    let _ = write!(
        html,
        "<form method=\"post\" action=\"/search\">\n\
         <label for=\"query\">Enter a git commit hash, email address or repository name</label>\n\
         <input id=\"query\" name=\"query\" type=\"text\" value=\"{}\">\n\
         <button type=\"submit\">Search</button>\n</form>\n",
        escape(query)
    );
    if let Some(warning) = warning {
        let _ = writeln!(html, "<div class=\"alert alert-danger\">{}</div>", escape(warning));
    }

    if !result.authors.is_empty() {
        render_authors(&mut html, &result.authors);
    }
    if !result.repos.is_empty() {
        render_repos(&mut html, &result.repos);
    }
    if !result.commits.is_empty() {
        render_commits(&mut html, &result.commits);
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn render_authors(html: &mut String, authors: &[Author]) {
    html.push_str("<h2>Authors</h2>\n<table>\n<tr><th>Name</th><th>Email</th><th>Company</th><th>Team</th></tr>\n");
    for author in authors {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&author.name),
            escape(&author.email),
            escape(author.company.as_deref().unwrap_or_default()),
            escape(author.team.as_deref().unwrap_or_default()),
        );
    }
    html.push_str("</table>\n");
}

fn render_repos(html: &mut String, repos: &[Repository]) {
    html.push_str("<h2>Repositories</h2>\n<table>\n<tr><th>Name</th><th>Clone URL</th><th>Type</th><th>Last indexed</th></tr>\n");
    for repo in repos {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td></tr>",
            escape(repo.repo_name.as_deref().unwrap_or_default()),
            escape(&repo.browse_url()),
            escape(&repo.clone_url),
            escape(repo.repo_type.as_deref().unwrap_or_default()),
            repo.last_indexed_at.map(|t| t.to_string()).unwrap_or_default(),
        );
    }
    html.push_str("</table>\n");
}

fn render_commits(html: &mut String, commits: &[CommitHit]) {
    html.push_str("<h2>Commits</h2>\n<table>\n<tr><th>Commit</th><th>Date</th><th>Message</th><th>Repositories</th></tr>\n");
    for hit in commits {
        let commit = &hit.commit;
        let sha = match hit.repos.iter().map(Repository::url_for_commit).find(|u| !u.is_empty()) {
            Some(prefix) => format!("<a href=\"{}/{}\">{}</a>", escape(&prefix), commit.sha, commit.sha),
            None => commit.sha.clone(),
        };
        let repos = hit
            .repos
            .iter()
            .map(|r| format!("<a href=\"{}\">{}</a>", escape(&r.browse_url()), escape(&r.clone_url)))
            .collect::<Vec<_>>()
            .join("<br>");
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            sha,
            commit.created_at_tz.format("%Y-%m-%d %H:%M:%S %:z"),
            escape(commit.message.lines().next().unwrap_or_default()),
            repos,
        );
    }
    html.push_str("</table>\n");
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
