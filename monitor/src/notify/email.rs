use crate::html::{escape, thousands, truncate_chars};
use shared_models::{AlertType, TrendAlert};
use std::fmt::Write;

const STYLE: &str = r#"
    body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; }
    .alert { border: 1px solid #ddd; border-radius: 8px; padding: 16px; margin: 16px 0; }
    .alert-rapid { border-left: 4px solid #f59e0b; }
    .alert-threshold { border-left: 4px solid #10b981; }
    .alert-type { font-size: 12px; color: #666; text-transform: uppercase; }
    .post-text { font-size: 16px; margin: 12px 0; }
    .metrics { display: flex; gap: 16px; color: #666; }
    .post-link { color: #1d9bf0; text-decoration: none; }
"#;

/// Renders alerts into `(subject, html_body, text_body)`.
pub fn format_alert_email(alerts: &[TrendAlert]) -> (String, String, String) {
    let subject = format!("[X Monitor] {} Trending Post(s) Detected!", alerts.len());

    let mut html = String::new();
    let mut text = String::new();

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>{}</style>\n</head>\n<body>\n\
         <h2>X Trending Alert</h2>\n<p>The following posts have triggered your monitoring rules:</p>\n",
        STYLE
    );
    let _ = write!(
        text,
        "X Trending Alert\n{}\n\nFound {} trending post(s):\n\n",
        "=".repeat(40),
        alerts.len()
    );

    for (i, alert) in alerts.iter().enumerate() {
        let post = &alert.post;
        let class = match alert.alert_type {
            AlertType::RapidGrowth => "alert-rapid",
            AlertType::ThresholdReached => "alert-threshold",
        };
        let label = alert.alert_type.label();

        let _ = write!(
            html,
            "<div class=\"alert {}\">\n<div class=\"alert-type\">{}</div>\n\
             <p class=\"post-text\">{}</p>\n<div class=\"metrics\">\n\
             <span>Likes: {}</span>\n<span>Reshares: {}</span>\n<span>Total: {}</span>\n",
            class,
            label,
            escape(truncate_chars(&post.text, 280)),
            thousands(post.likes),
            thousands(post.reshares),
            thousands(alert.current_engagement),
        );
        if let Some(rate) = alert.growth_rate {
            let _ = writeln!(html, "<span>Growth: {:.0}/hour</span>", rate);
        }
        let _ = write!(
            html,
            "</div>\n<p><a href=\"{}\" class=\"post-link\">View on X</a>",
            escape(&post.url)
        );
        if let Some(keyword) = &alert.matched_keyword {
            let _ = write!(html, " | Matched: \"{}\"", escape(keyword));
        }
        html.push_str("</p>\n</div>\n");

        let _ = writeln!(text, "#{} [{}]", i + 1, label);
        let _ = writeln!(text, "{}...", truncate_chars(&post.text, 200));
        let _ = writeln!(text, "Engagement: {}", thousands(alert.current_engagement));
        if let Some(rate) = alert.growth_rate {
            let _ = writeln!(text, "Growth Rate: {:.0}/hour", rate);
        }
        let _ = writeln!(text, "Link: {}", post.url);
        if let Some(keyword) = &alert.matched_keyword {
            let _ = writeln!(text, "Matched keyword: {}", keyword);
        }
        let _ = write!(text, "\n{}\n\n", "-".repeat(40));
    }

    html.push_str(
        "<p style=\"color: #666; font-size: 12px; margin-top: 24px;\">Sent by X Trending Monitor</p>\n\
         </body>\n</html>\n",
    );

    (subject, html, text)
}
