//! Pull-request aggregation for daily notes and contribution recaps.
//!
//! Every query goes through one [`GitHubClient`], one after another, so all
//! of them share its request spacing and retry budget. A query that yields
//! no data counts as empty; it never aborts the rest of the aggregation.

use crate::error::AppError;
use crate::models::{GitHubRecapStats, PrInfo, RolloverSettings};
use crate::services::github_client::{GitHubClient, GitHubPullRequest, GitHubSearchResponse};
use crate::services::sections::is_callout_header;
use chrono::{Duration, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;

/// Pull requests listed per repository query.
const PER_PAGE: u32 = 100;

/// Note lines for each PR category, in API response order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubPrItems {
    /// PRs awaiting the user's review.
    pub review_items: Vec<String>,
    /// The user's open PRs and PRs merged in the last day.
    #[serde(rename = "openPRItems")]
    pub open_pr_items: Vec<String>,
    /// Other people's PRs carrying a tracked label.
    pub labeled_items: Vec<String>,
}

impl GitHubPrItems {
    pub fn is_empty(&self) -> bool {
        self.review_items.is_empty() && self.open_pr_items.is_empty() && self.labeled_items.is_empty()
    }
}

/// `"> "` when items go under a callout heading.
fn item_prefix(heading: &str) -> &'static str {
    if is_callout_header(heading) {
        "> "
    } else {
        ""
    }
}

/// Run one query, logging failures as "no data".
async fn fetch<T: DeserializeOwned>(client: &GitHubClient, url: &str) -> Option<T> {
    match client.request::<T>(url).await {
        Ok(body) => body,
        Err(e) => {
            log::error!("[github] request failed for {}: {}", url, e);
            None
        }
    }
}

fn search_url(client: &GitHubClient, query: &str, extra: &str) -> String {
    client.api_url(&format!(
        "/search/issues?q={}{}",
        urlencoding::encode(query),
        extra
    ))
}

/// Gather review requests, the user's own PRs and tracked-label PRs.
///
/// Returns empty lists without touching the network when the integration is
/// disabled or credentials are missing.
pub async fn fetch_github_prs(client: &GitHubClient, settings: &RolloverSettings) -> GitHubPrItems {
    let mut items = GitHubPrItems::default();
    if !settings.enable_github_integration || !settings.has_github_credentials() {
        log::debug!("[github] integration disabled or credentials missing, skipping PR fetch");
        return items;
    }

    let username = settings.github_username.trim();
    let since = client.now() - Duration::hours(24);

    // Review requests
    let review_prefix = item_prefix(&settings.github_section_heading);
    let mut review_urls: HashSet<String> = HashSet::new();
    let query = format!("type:pr state:open review-requested:{}", username);
    let url = search_url(client, &query, "&sort=updated&order=desc");
    if let Some(search) = fetch::<GitHubSearchResponse>(client, &url).await {
        for pr in search.items {
            items.review_items.push(format!(
                "{}- [ ] Review requested: [{}]({})",
                review_prefix, pr.title, pr.html_url
            ));
            review_urls.insert(pr.html_url);
        }
    }

    let open_prefix = item_prefix(&settings.github_open_prs_heading);
    let labeled_prefix = item_prefix(&settings.github_labeled_prs_heading);
    let tracked_labels = settings.tracked_labels();

    for repo in settings.repositories() {
        if !repo.contains('/') {
            log::debug!("[github] skipping repository without owner: {}", repo);
            continue;
        }

        let url = client.api_url(&format!(
            "/repos/{}/pulls?state=open&per_page={}",
            repo, PER_PAGE
        ));
        if let Some(open) = fetch::<Vec<GitHubPullRequest>>(client, &url).await {
            for pr in open {
                if pr.is_authored_by(username) {
                    if pr.updated_at >= since {
                        items.open_pr_items.push(format!(
                            "{}- [ ] 🔥 [{}]({}) *(activity since yesterday)*",
                            open_prefix, pr.title, pr.html_url
                        ));
                    } else {
                        items.open_pr_items.push(format!(
                            "{}- [ ] [{}]({})",
                            open_prefix, pr.title, pr.html_url
                        ));
                    }
                } else if !tracked_labels.is_empty()
                    && !review_urls.contains(&pr.html_url)
                    && !pr.is_draft()
                    && pr.has_any_label(&tracked_labels)
                {
                    items.labeled_items.push(format!(
                        "{}- [ ] *{}* [{}]({})",
                        labeled_prefix, repo, pr.title, pr.html_url
                    ));
                }
            }
        }

        let url = client.api_url(&format!(
            "/repos/{}/pulls?state=closed&per_page={}&sort=updated&direction=desc",
            repo, PER_PAGE
        ));
        if let Some(closed) = fetch::<Vec<GitHubPullRequest>>(client, &url).await {
            for pr in closed {
                let merged_recently = pr.merged_at.is_some_and(|at| at >= since);
                if pr.is_authored_by(username) && merged_recently {
                    items.open_pr_items.push(format!(
                        "{}- [x] ✅ [{}]({}) *(merged)*",
                        open_prefix, pr.title, pr.html_url
                    ));
                }
            }
        }
    }

    items
}

/// First and last day of a calendar month (`month` is 1-based).
pub fn month_range(month: u32, year: i32) -> Result<(NaiveDate, NaiveDate), AppError> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::invalid_input_field("Month must be between 1 and 12", "month"))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| AppError::invalid_input_field("Year out of range", "year"))?;

    Ok((start, next - Duration::days(1)))
}

/// ` repo:a OR repo:b` qualifier, empty when every repository is in scope.
pub fn repo_filter(settings: &RolloverSettings) -> String {
    if settings.github_recap_all_repos {
        return String::new();
    }

    let qualifiers: Vec<String> = settings
        .repositories()
        .into_iter()
        .filter(|r| r.contains('/'))
        .map(|r| format!("repo:{}", r))
        .collect();

    if qualifiers.is_empty() {
        String::new()
    } else {
        format!(" {}", qualifiers.join(" OR "))
    }
}

async fn recap_search(client: &GitHubClient, query: String) -> Option<GitHubSearchResponse> {
    let url = search_url(client, &query, &format!("&per_page={}", PER_PAGE));
    fetch::<GitHubSearchResponse>(client, &url).await
}

/// Contribution recap for one calendar month (`month` is 1-based).
///
/// Returns zeroed stats without network calls when credentials are missing.
pub async fn fetch_github_recap(
    client: &GitHubClient,
    settings: &RolloverSettings,
    month: u32,
    year: i32,
) -> Result<GitHubRecapStats, AppError> {
    let (start, end) = month_range(month, year)?;
    let mut stats = GitHubRecapStats::default();
    if !settings.has_github_credentials() {
        log::warn!("[recap] GitHub credentials missing, returning empty recap");
        return Ok(stats);
    }

    let user = settings.github_username.trim();
    let range = format!("{}..{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"));
    let filter = repo_filter(settings);
    let search = |query: String| recap_search(client, query);

    if let Some(opened) = search(format!("type:pr author:{} created:{}{}", user, range, filter)).await {
        stats.prs_opened = opened.total_count;
        for pr in opened.items {
            let repo = pr.repo_full_name().unwrap_or_default();
            if !repo.is_empty() {
                stats.record_contribution(&repo);
            }
            stats.pr_list.push(PrInfo {
                title: pr.title,
                url: pr.html_url,
                repo,
            });
        }
    }

    if let Some(merged) =
        search(format!("type:pr author:{} is:merged merged:{}{}", user, range, filter)).await
    {
        stats.prs_merged = merged.total_count;
    }

    if let Some(reviewed) = search(format!(
        "type:pr reviewed-by:{} -author:{} updated:{}{}",
        user, user, range, filter
    ))
    .await
    {
        stats.prs_reviewed = reviewed.total_count;
        for repo in reviewed.items.iter().filter_map(|pr| pr.repo_full_name()) {
            stats.record_contribution(&repo);
        }
    }

    if let Some(commented) = search(format!(
        "type:pr commenter:{} -author:{} updated:{}{}",
        user, user, range, filter
    ))
    .await
    {
        stats.review_comments = commented.total_count;
    }

    if let Some(issues) =
        search(format!("type:issue author:{} created:{}{}", user, range, filter)).await
    {
        stats.issues_opened = issues.total_count;
        for repo in issues.items.iter().filter_map(|i| i.repo_full_name()) {
            stats.record_contribution(&repo);
        }
    }

    if let Some(closed) =
        search(format!("type:issue involves:{} closed:{}{}", user, range, filter)).await
    {
        stats.issues_closed = closed.total_count;
    }

    stats.refresh_most_active();
    log::info!(
        "[recap] {}-{:02}: {} opened, {} merged, {} reviewed",
        year,
        month,
        stats.prs_opened,
        stats.prs_merged,
        stats.prs_reviewed
    );
    Ok(stats)
}

/// Contribution recap for a whole year, month by month.
///
/// Months run sequentially through the same client; counters, PR lists and
/// per-repository tallies are summed and the most active repository is
/// recomputed from the sum.
pub async fn fetch_github_yearly_recap(
    client: &GitHubClient,
    settings: &RolloverSettings,
    year: i32,
) -> Result<GitHubRecapStats, AppError> {
    let mut total = GitHubRecapStats::default();
    if !settings.has_github_credentials() {
        log::warn!("[recap] GitHub credentials missing, returning empty recap");
        return Ok(total);
    }

    for month in 1..=12 {
        let stats = fetch_github_recap(client, settings, month, year).await?;
        total.absorb(stats);
    }

    total.refresh_most_active();
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::github_client::GitHubClientConfig;
    use crate::services::test_support::{response, ManualClock, ScriptedTransport};
    use std::sync::Arc;

    fn settings() -> RolloverSettings {
        RolloverSettings {
            enable_github_integration: true,
            github_token: "ghp_test".to_string(),
            github_username: "alice".to_string(),
            github_repos: "org/app, not-a-repo".to_string(),
            github_tracked_labels: "urgent".to_string(),
            ..Default::default()
        }
    }

    fn client(transport: &Arc<ScriptedTransport>) -> GitHubClient {
        let config = GitHubClientConfig {
            token: "ghp_test".to_string(),
            ..Default::default()
        };
        GitHubClient::with_parts(config, transport.clone(), ManualClock::new())
    }

    fn pr(number: u32, login: &str, updated: &str, labels: &[&str], draft: bool) -> String {
        let labels: Vec<String> = labels
            .iter()
            .map(|l| format!(r#"{{"name":"{}"}}"#, l))
            .collect();
        format!(
            r#"{{"number":{n},"title":"PR {n}","html_url":"https://github.com/org/app/pull/{n}",
                "user":{{"login":"{login}"}},"updated_at":"{updated}","merged_at":null,
                "draft":{draft},"labels":[{labels}]}}"#,
            n = number,
            login = login,
            updated = updated,
            draft = draft,
            labels = labels.join(",")
        )
    }

    const NO_REVIEWS: &str = r#"{"total_count":0,"items":[]}"#;

    #[tokio::test]
    async fn test_disabled_integration_makes_no_calls() {
        let transport = ScriptedTransport::new(vec![]);
        let mut disabled = settings();
        disabled.enable_github_integration = false;
        assert!(fetch_github_prs(&client(&transport), &disabled).await.is_empty());

        let mut anonymous = settings();
        anonymous.github_token.clear();
        assert!(fetch_github_prs(&client(&transport), &anonymous).await.is_empty());

        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_classifies_own_and_labeled_prs() {
        let open = format!(
            "[{},{}]",
            pr(1, "alice", "2024-05-01T10:00:00Z", &[], false),
            pr(2, "bob", "2024-04-20T10:00:00Z", &["urgent"], false)
        );
        let transport = ScriptedTransport::routed(vec![
            ("review-requested", response(200, NO_REVIEWS)),
            ("/repos/org/app/pulls?state=open", response(200, &open)),
            ("/repos/org/app/pulls?state=closed", response(200, "[]")),
        ]);

        let items = fetch_github_prs(&client(&transport), &settings()).await;

        assert_eq!(
            items.open_pr_items,
            vec!["- [ ] 🔥 [PR 1](https://github.com/org/app/pull/1) *(activity since yesterday)*"]
        );
        assert_eq!(
            items.labeled_items,
            vec!["- [ ] *org/app* [PR 2](https://github.com/org/app/pull/2)"]
        );
        assert!(items.review_items.is_empty());
        // the bare name is never queried
        assert!(transport.urls().iter().all(|u| !u.contains("not-a-repo")));
    }

    #[tokio::test]
    async fn test_review_requests_win_over_labels() {
        let reviews = r#"{"total_count":1,"items":[{"title":"PR 2",
            "html_url":"https://github.com/org/app/pull/2",
            "repository_url":"https://api.github.com/repos/org/app"}]}"#;
        let open = format!(
            "[{},{},{},{}]",
            pr(2, "bob", "2024-05-01T10:00:00Z", &["urgent"], false),
            pr(3, "bob", "2024-05-01T10:00:00Z", &["urgent"], true),
            pr(4, "carol", "2024-05-01T10:00:00Z", &["chore"], false),
            pr(5, "alice", "2024-04-01T10:00:00Z", &["urgent"], false)
        );
        let transport = ScriptedTransport::routed(vec![
            ("review-requested", response(200, reviews)),
            ("state=open", response(200, &open)),
            ("state=closed", response(200, "[]")),
        ]);

        let items = fetch_github_prs(&client(&transport), &settings()).await;

        assert_eq!(
            items.review_items,
            vec!["- [ ] Review requested: [PR 2](https://github.com/org/app/pull/2)"]
        );
        assert!(items.labeled_items.is_empty());
        // own PR with a tracked label stays in the open list, without the active marker
        assert_eq!(
            items.open_pr_items,
            vec!["- [ ] [PR 5](https://github.com/org/app/pull/5)"]
        );
    }

    #[tokio::test]
    async fn test_recently_merged_prs() {
        let closed = r#"[
            {"number":7,"title":"Shipped","html_url":"https://github.com/org/app/pull/7",
             "user":{"login":"alice"},"updated_at":"2024-05-01T09:00:00Z",
             "merged_at":"2024-05-01T09:00:00Z"},
            {"number":8,"title":"Old","html_url":"https://github.com/org/app/pull/8",
             "user":{"login":"alice"},"updated_at":"2024-04-01T09:00:00Z",
             "merged_at":"2024-04-01T09:00:00Z"},
            {"number":9,"title":"Closed","html_url":"https://github.com/org/app/pull/9",
             "user":{"login":"alice"},"updated_at":"2024-05-01T09:00:00Z","merged_at":null}
        ]"#;
        let transport = ScriptedTransport::routed(vec![
            ("review-requested", response(200, NO_REVIEWS)),
            ("state=open", response(200, "[]")),
            ("state=closed", response(200, closed)),
        ]);

        let mut callout = settings();
        callout.github_open_prs_heading = "> [!success] Mine".to_string();
        let items = fetch_github_prs(&client(&transport), &callout).await;

        assert_eq!(
            items.open_pr_items,
            vec!["> - [x] ✅ [Shipped](https://github.com/org/app/pull/7) *(merged)*"]
        );
    }

    #[tokio::test]
    async fn test_failed_repository_query_does_not_abort() {
        let transport = ScriptedTransport::routed(vec![
            ("review-requested", response(500, "")),
            ("state=open", response(404, "")),
            (
                "state=closed",
                response(
                    200,
                    r#"[{"number":7,"title":"Shipped","html_url":"https://github.com/org/app/pull/7",
                        "user":{"login":"alice"},"updated_at":"2024-05-01T09:00:00Z",
                        "merged_at":"2024-05-01T09:00:00Z"}]"#,
                ),
            ),
        ]);

        let items = fetch_github_prs(&client(&transport), &settings()).await;
        assert_eq!(items.open_pr_items.len(), 1);
        assert_eq!(transport.calls().len(), 3);
    }

    #[test]
    fn test_month_range() {
        let (start, end) = month_range(2, 2024).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let (_, december_end) = month_range(12, 2023).unwrap();
        assert_eq!(december_end, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());

        assert!(matches!(
            month_range(13, 2024),
            Err(AppError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_repo_filter() {
        assert_eq!(repo_filter(&settings()), " repo:org/app");

        let mut many = settings();
        many.github_repositories = vec!["org/web".to_string()];
        assert_eq!(repo_filter(&many), " repo:org/app OR repo:org/web");

        many.github_recap_all_repos = true;
        assert_eq!(repo_filter(&many), "");
    }

    fn search_body(total: u32, repos: &[&str]) -> String {
        let items: Vec<String> = repos
            .iter()
            .enumerate()
            .map(|(i, repo)| {
                format!(
                    r#"{{"title":"Item {i}","html_url":"https://github.com/{repo}/pull/{i}",
                        "repository_url":"https://api.github.com/repos/{repo}"}}"#,
                    i = i,
                    repo = repo
                )
            })
            .collect();
        format!(r#"{{"total_count":{},"items":[{}]}}"#, total, items.join(","))
    }

    fn recap_routes() -> Vec<(&'static str, crate::services::github_client::HttpResponse)> {
        vec![
            (
                "type%3Apr%20author%3Aalice%20created",
                response(200, &search_body(2, &["org/a", "org/b"])),
            ),
            ("is%3Amerged", response(200, &search_body(1, &["org/a"]))),
            (
                "reviewed-by%3Aalice",
                response(200, &search_body(3, &["org/b", "org/b", "org/a"])),
            ),
            ("commenter%3Aalice", response(200, &search_body(9, &[]))),
            (
                "type%3Aissue%20author%3Aalice",
                response(200, &search_body(1, &["org/b"])),
            ),
            ("involves%3Aalice", response(200, &search_body(4, &[]))),
        ]
    }

    #[tokio::test]
    async fn test_monthly_recap() {
        let transport = ScriptedTransport::routed(recap_routes());
        let mut all_repos = settings();
        all_repos.github_recap_all_repos = true;

        let stats = fetch_github_recap(&client(&transport), &all_repos, 3, 2024)
            .await
            .unwrap();

        assert_eq!(stats.prs_opened, 2);
        assert_eq!(stats.prs_merged, 1);
        assert_eq!(stats.prs_reviewed, 3);
        assert_eq!(stats.review_comments, 9);
        assert_eq!(stats.issues_opened, 1);
        assert_eq!(stats.issues_closed, 4);
        assert_eq!(stats.pr_list.len(), 2);
        assert_eq!(stats.pr_list[1].repo, "org/b");
        // org/a: 1 opened + 1 reviewed, org/b: 1 opened + 2 reviewed + 1 issue
        assert_eq!(stats.most_active_repo.as_deref(), Some("org/b"));
        assert_eq!(stats.most_active_repo_count, 4);

        let urls = transport.urls();
        assert_eq!(urls.len(), 6);
        assert!(urls[0].contains("2024-03-01..2024-03-31"));
        assert!(urls.iter().all(|u| !u.contains("repo%3A")));
    }

    #[tokio::test]
    async fn test_monthly_recap_without_credentials() {
        let transport = ScriptedTransport::new(vec![]);
        let mut anonymous = settings();
        anonymous.github_username.clear();

        let stats = fetch_github_recap(&client(&transport), &anonymous, 3, 2024)
            .await
            .unwrap();

        assert_eq!(stats, GitHubRecapStats::default());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_yearly_recap_sums_months() {
        let transport = ScriptedTransport::routed(recap_routes());

        let stats = fetch_github_yearly_recap(&client(&transport), &settings(), 2024)
            .await
            .unwrap();

        assert_eq!(transport.calls().len(), 72);
        assert_eq!(stats.prs_opened, 24);
        assert_eq!(stats.issues_closed, 48);
        assert_eq!(stats.pr_list.len(), 24);
        assert_eq!(stats.most_active_repo.as_deref(), Some("org/b"));
        assert_eq!(stats.most_active_repo_count, 48);
        assert!(transport.urls()[0].contains("repo%3Aorg%2Fapp"));
    }
}
