use std::path::Path;

use crate::domain::error::AppError;
use crate::domain::interview::InterviewStats;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const STYLE: &str = "
    body {
        font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
        margin: 0;
        padding: 20px;
        background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
        color: white;
    }
    .container { max-width: 1200px; margin: 0 auto; }
    .header { text-align: center; margin-bottom: 40px; }
    .stats-grid {
        display: grid;
        grid-template-columns: repeat(auto-fit, minmax(250px, 1fr));
        gap: 20px;
        margin-bottom: 40px;
    }
    .stat-card, .interest-chart {
        background: rgba(255, 255, 255, 0.1);
        padding: 30px;
        border-radius: 15px;
        backdrop-filter: blur(10px);
        border: 1px solid rgba(255, 255, 255, 0.2);
    }
    .stat-card { text-align: center; }
    .stat-number { font-size: 3em; font-weight: bold; margin-bottom: 10px; }
    .stat-label { font-size: 1.2em; opacity: 0.9; }
    .bar { display: flex; align-items: center; margin: 15px 0; }
    .bar-label { width: 80px; }
    .bar-fill {
        height: 25px;
        background: rgba(255, 255, 255, 0.3);
        border-radius: 12px;
        margin: 0 15px;
        flex: 1;
    }
    .bar-progress { height: 100%; border-radius: 12px; }
    .high { background: #4CAF50; }
    .medium { background: #FF9800; }
    .low { background: #F44336; }
    .timestamp { text-align: center; margin-top: 40px; opacity: 0.7; }
";

/// 統計から単体で開ける HTML を組み立てる
pub fn render_dashboard(stats: &InterviewStats, organization: &str, generated_at: &str) -> String {
    let org = escape(organization);
    let mut html = format!(
        "<!DOCTYPE html>
<html lang=\"en\">
<head>
<meta charset=\"UTF-8\">
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">
<title>{org} Interview Dashboard</title>
<style>{STYLE}</style>
</head>
<body>
<div class=\"container\">
  <div class=\"header\">
    <h1>{org} Interview Dashboard</h1>
    <p>Interview analytics and candidate insights</p>
  </div>
  <div class=\"stats-grid\">
    <div class=\"stat-card\"><div class=\"stat-number\">{total}</div><div class=\"stat-label\">Total Interviews</div></div>
    <div class=\"stat-card\"><div class=\"stat-number\">{today}</div><div class=\"stat-label\">Today's Interviews</div></div>
    <div class=\"stat-card\"><div class=\"stat-number\">{avg}</div><div class=\"stat-label\">Average Interest</div></div>
  </div>
  <div class=\"interest-chart\">
    <h2>Interest Level Distribution</h2>
",
        total = stats.total_interviews,
        today = stats.today_interviews,
        avg = escape(&stats.avg_interest),
    );

    let dist = &stats.interest_distribution;
    let total = dist.high + dist.medium + dist.low;
    if total == 0 {
        html.push_str("    <p>No interview data available yet.</p>\n");
    } else {
        for (class, label, count) in [
            ("high", "High", dist.high),
            ("medium", "Medium", dist.medium),
            ("low", "Low", dist.low),
        ] {
            let pct = count as f64 * 100.0 / total as f64;
            html.push_str(&format!(
                "    <div class=\"bar\"><div class=\"bar-label\">{label}</div>\
                 <div class=\"bar-fill\"><div class=\"bar-progress {class}\" style=\"width: {pct:.1}%\"></div></div>\
                 <div>{count} ({pct:.1}%)</div></div>\n"
            ));
        }
    }

    html.push_str(&format!(
        "  </div>
  <div class=\"timestamp\">Last updated: {}</div>
</div>
</body>
</html>
",
        escape(generated_at)
    ));
    html
}

pub fn write_dashboard(path: &Path, html: &str) -> Result<(), AppError> {
    std::fs::write(path, html)
        .map_err(|e| AppError::io(format!("Failed to write dashboard {}: {e}", path.display())))?;
    log::info!("Dashboard generated: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interview::InterestDistribution;

    fn stats(high: u32, medium: u32, low: u32) -> InterviewStats {
        let dist = InterestDistribution { high, medium, low };
        InterviewStats {
            total_interviews: high + medium + low,
            today_interviews: 1,
            avg_interest: InterviewStats::average_label(&dist),
            interest_distribution: dist,
        }
    }

    #[test]
    fn empty_dashboard_has_placeholder() {
        let html = render_dashboard(&stats(0, 0, 0), "LunarTech", "2025-01-15 10:00:00");
        assert!(html.contains("No interview data available yet."));
        assert!(html.contains("N/A"));
        assert!(html.contains("#667eea"));
        assert!(html.contains("Last updated: 2025-01-15 10:00:00"));
    }

    #[test]
    fn bars_show_percentages() {
        let html = render_dashboard(&stats(1, 3, 0), "LunarTech", "now");
        assert!(html.contains("1 (25.0%)"));
        assert!(html.contains("3 (75.0%)"));
        assert!(html.contains("0 (0.0%)"));
        assert!(html.contains("bar-progress high"));
    }

    #[test]
    fn organization_is_escaped() {
        let html = render_dashboard(&stats(0, 0, 0), "<Lunar & Tech>", "now");
        assert!(html.contains("&lt;Lunar &amp; Tech&gt; Interview Dashboard"));
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.html");
        write_dashboard(&path, "<html></html>").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<html></html>");
    }
}
