//! Static HTML dashboard plus a browsable history of past runs.

use crate::html::{escape, thousands};
use crate::state::{load_or_default, write_atomic};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Asia::Tokyo;
use serde::{Deserialize, Serialize};
use shared_models::error::{ModelError, Result};
use shared_models::{AnalyzedPost, RecommendedAction};
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const HISTORY_DIR: &str = "history";
const STAMP_FORMAT: &str = "%Y%m%d_%H%M";

const STYLE: &str = r#"
    body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #f5f7fa; margin: 0; }
    .container { max-width: 960px; margin: 0 auto; padding: 24px; }
    header { display: flex; justify-content: space-between; align-items: baseline; }
    .stats { display: flex; gap: 16px; margin: 16px 0; }
    .stat { background: #fff; border-radius: 8px; padding: 12px 20px; }
    .stat-value { font-size: 24px; font-weight: 600; }
    section { margin: 24px 0; }
    .card { background: #fff; border-radius: 8px; padding: 16px; margin: 12px 0; border-left: 4px solid #ddd; }
    .section-high .card { border-left-color: #ef4444; }
    .section-suggested .card { border-left-color: #f59e0b; }
    .section-optional .card { border-left-color: #9ca3af; }
    .rank { font-weight: 600; color: #666; }
    .bar { background: #eee; border-radius: 4px; height: 6px; width: 120px; display: inline-block; }
    .bar-fill { background: #1d9bf0; border-radius: 4px; height: 6px; display: block; }
    .meta { color: #666; font-size: 13px; }
    .history-day { background: #fff; border-radius: 8px; padding: 16px; margin: 12px 0; }
    .history-item { display: flex; justify-content: space-between; padding: 6px 0; text-decoration: none; color: inherit; }
    .badge-high { color: #ef4444; margin-left: 8px; }
"#;

/// Machine-readable companion of a rendered dashboard.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DashboardData {
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_posts: usize,
    #[serde(default)]
    pub posts: Vec<AnalyzedPost>,
}

impl DashboardData {
    pub fn high_priority_count(&self) -> usize {
        self.posts
            .iter()
            .filter(|p| p.analysis.recommended_action == RecommendedAction::HighPriority)
            .count()
    }
}

fn score_bar(label: &str, score: u8) -> String {
    format!(
        "<span class=\"meta\">{} {}/10</span> <span class=\"bar\"><span class=\"bar-fill\" style=\"width: {}%\"></span></span>",
        label,
        score,
        u32::from(score.min(10)) * 10
    )
}

fn post_card(out: &mut String, post: &AnalyzedPost) {
    let analysis = &post.analysis;
    let _ = write!(
        out,
        "<div class=\"card\">\n<div><span class=\"rank\">#{}</span> \
         <span class=\"meta\">@{} · {} engagements</span></div>\n<p>{}</p>\n",
        post.priority_rank,
        escape(&post.post.author_handle),
        thousands(post.post.total_engagement),
        escape(&post.post.text),
    );
    if !analysis.translated_text.is_empty() {
        let _ = writeln!(out, "<p class=\"meta\">{}</p>", escape(&analysis.translated_text));
    }
    let _ = writeln!(
        out,
        "<div>{} {}</div>",
        score_bar("Relevance", analysis.relevance_score),
        score_bar("Potential", analysis.engagement_potential)
    );
    if !analysis.reasoning.is_empty() {
        let _ = writeln!(out, "<p><strong>Why:</strong> {}</p>", escape(&analysis.reasoning));
    }
    if !analysis.reply_angle.is_empty() {
        let _ = writeln!(
            out,
            "<p><strong>Reply angle:</strong> {}</p>",
            escape(&analysis.reply_angle)
        );
    }
    let _ = write!(
        out,
        "<a href=\"{}\" target=\"_blank\" rel=\"noopener\">Open post</a>\n</div>\n",
        escape(&post.post.url)
    );
}

fn section(out: &mut String, title: &str, class: &str, posts: &[&AnalyzedPost]) {
    if posts.is_empty() {
        return;
    }
    let _ = writeln!(
        out,
        "<section class=\"{}\">\n<h2>{} ({})</h2>",
        class,
        title,
        posts.len()
    );
    for post in posts {
        post_card(out, post);
    }
    out.push_str("</section>\n");
}

/// Renders the ranked posts into a standalone page. Observe-only posts are
/// counted but not listed.
pub fn render_dashboard(posts: &[AnalyzedPost], updated_at: DateTime<Utc>) -> String {
    let pick = |wanted: &[RecommendedAction]| -> Vec<&AnalyzedPost> {
        posts
            .iter()
            .filter(|p| wanted.contains(&p.analysis.recommended_action))
            .collect()
    };
    let high = pick(&[RecommendedAction::HighPriority]);
    let suggested = pick(&[RecommendedAction::Suggested]);
    let optional = pick(&[RecommendedAction::Optional, RecommendedAction::AnalysisFailed]);

    let mut out = String::new();
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>Trend Monitor</title>\n<style>{}</style>\n</head>\n<body>\n<div class=\"container\">\n\
         <header><h1>Trend Monitor</h1><span class=\"meta\">Updated {}</span></header>\n\
         <div class=\"stats\">\n\
         <div class=\"stat\"><div class=\"stat-value\">{}</div>High priority</div>\n\
         <div class=\"stat\"><div class=\"stat-value\">{}</div>Suggested</div>\n\
         <div class=\"stat\"><div class=\"stat-value\">{}</div>Total posts</div>\n\
         </div>\n",
        STYLE,
        updated_at.format("%Y-%m-%d %H:%M UTC"),
        high.len(),
        suggested.len(),
        posts.len(),
    );

    if posts.is_empty() {
        out.push_str("<p class=\"meta\">No trending posts in this run.</p>\n");
    }
    section(&mut out, "High Priority", "section-high", &high);
    section(&mut out, "Suggested", "section-suggested", &suggested);
    section(&mut out, "Optional", "section-optional", &optional);

    out.push_str("<p class=\"meta\"><a href=\"index.html\">History</a></p>\n</div>\n</body>\n</html>\n");
    out
}

/// Paths written by [`publish_dashboard`].
#[derive(Debug, Clone)]
pub struct PublishedDashboard {
    pub dashboard: PathBuf,
    pub data: PathBuf,
    pub history_dashboard: PathBuf,
    pub history_data: PathBuf,
}

fn write_html(path: &Path, html: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, html)
        .map_err(|e| ModelError::Storage(format!("Failed to write {}: {}", path.display(), e)))
}

/// Writes the current dashboard and its data file, plus a timestamped copy
/// of both under `history/{date}/`.
pub fn publish_dashboard(
    dir: &Path,
    posts: &[AnalyzedPost],
    now: DateTime<Utc>,
) -> Result<PublishedDashboard> {
    let html = render_dashboard(posts, now);
    let data = DashboardData {
        last_updated: Some(now),
        total_posts: posts.len(),
        posts: posts.to_vec(),
    };

    let stamp = now.format(STAMP_FORMAT).to_string();
    let day_dir = dir
        .join(HISTORY_DIR)
        .join(now.format("%Y-%m-%d").to_string());

    let published = PublishedDashboard {
        dashboard: dir.join("dashboard.html"),
        data: dir.join("data.json"),
        history_dashboard: day_dir.join(format!("dashboard_{}.html", stamp)),
        history_data: day_dir.join(format!("data_{}.json", stamp)),
    };

    write_html(&published.dashboard, &html)?;
    write_atomic(&published.data, &data)?;
    write_html(&published.history_dashboard, &html)?;
    write_atomic(&published.history_data, &data)?;

    info!(
        dir = %dir.display(),
        posts = posts.len(),
        high_priority = data.high_priority_count(),
        "📊 Dashboard published"
    );
    Ok(published)
}

/// One archived dashboard as listed on the index page.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub href: String,
    pub taken_at: DateTime<Utc>,
    pub total: usize,
    pub high_priority: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryDay {
    pub date: NaiveDate,
    pub entries: Vec<HistoryEntry>,
}

fn sorted_children(dir: &Path) -> Vec<PathBuf> {
    let mut children: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(read) => read.filter_map(|e| e.ok().map(|e| e.path())).collect(),
        Err(_) => Vec::new(),
    };
    children.sort();
    children.reverse();
    children
}

/// Archived dashboards, newest day first and newest run first within a day.
/// Entries whose data file is unreadable report zero counts.
pub fn scan_history(dir: &Path) -> Vec<HistoryDay> {
    let mut days = Vec::new();

    for day_dir in sorted_children(&dir.join(HISTORY_DIR)) {
        let Some(date) = day_dir
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| NaiveDate::parse_from_str(n, "%Y-%m-%d").ok())
        else {
            continue;
        };

        let entries: Vec<HistoryEntry> = sorted_children(&day_dir)
            .into_iter()
            .filter_map(|file| {
                let name = file.file_name()?.to_str()?;
                let stamp = name.strip_prefix("dashboard_")?.strip_suffix(".html")?;
                let naive = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()?;
                let data: DashboardData =
                    load_or_default(&day_dir.join(format!("data_{}.json", stamp)));
                Some(HistoryEntry {
                    href: format!("{}/{}/{}", HISTORY_DIR, date.format("%Y-%m-%d"), name),
                    taken_at: Utc.from_utc_datetime(&naive),
                    total: data.total_posts,
                    high_priority: data.high_priority_count(),
                })
            })
            .collect();

        if !entries.is_empty() {
            days.push(HistoryDay { date, entries });
        }
    }
    days
}

fn index_html(days: &[HistoryDay], generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>Trend Monitor History</title>\n<style>{}</style>\n</head>\n<body>\n<div class=\"container\">\n\
         <header><h1>Trend Monitor</h1><span class=\"meta\">Generated {} / {}</span></header>\n\
         <p><a href=\"dashboard.html\">Latest dashboard</a></p>\n",
        STYLE,
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        generated_at.with_timezone(&Tokyo).format("%Y-%m-%d %H:%M JST"),
    );

    if days.is_empty() {
        out.push_str("<p class=\"meta\">No history yet.</p>\n");
    }
    for day in days {
        let _ = writeln!(
            out,
            "<div class=\"history-day\">\n<h3>{}</h3>",
            day.date.format("%Y-%m-%d")
        );
        for entry in &day.entries {
            let badge = if entry.high_priority > 0 {
                format!("<span class=\"badge-high\">{} high priority</span>", entry.high_priority)
            } else {
                String::new()
            };
            let _ = writeln!(
                out,
                "<a class=\"history-item\" href=\"{}\"><span>{} <span class=\"meta\">({})</span></span>\
                 <span>{} posts{}</span></a>",
                escape(&entry.href),
                entry.taken_at.with_timezone(&Tokyo).format("%H:%M JST"),
                entry.taken_at.format("%H:%M UTC"),
                entry.total,
                badge
            );
        }
        out.push_str("</div>\n");
    }

    out.push_str("</div>\n</body>\n</html>\n");
    out
}

/// Rebuilds `{dir}/index.html` from the archived dashboards.
pub fn render_index(dir: &Path) -> Result<PathBuf> {
    render_index_at(dir, Utc::now())
}

pub fn render_index_at(dir: &Path, now: DateTime<Utc>) -> Result<PathBuf> {
    let days = scan_history(dir);
    debug!(days = days.len(), "Scanned dashboard history");
    let path = dir.join("index.html");
    write_html(&path, &index_html(&days, now))?;
    info!(path = %path.display(), days = days.len(), "Index page written");
    Ok(path)
}
