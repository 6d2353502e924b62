//! JSON shapes returned by the read endpoints.

use crate::membership::Membership;
use crate::models::{AdviserBrief, AdviserCard, Gender, Portfolio, Recommendation, User, Viewpoint};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

lazy_static! {
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref TAG: Regex = Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)([^>]*)>").unwrap();
    static ref LINK_ATTR: Regex =
        Regex::new(r#"(?i)\b(href|title)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap();
}

const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "blockquote", "code", "em", "i", "li", "ol", "strong", "ul",
];

const ALLOWED_PROTOCOLS: &[&str] = &["http://", "https://", "mailto:"];

fn rebuild_link(attrs: &str) -> String {
    let mut kept = String::new();
    for caps in LINK_ATTR.captures_iter(attrs) {
        let name = caps[1].to_ascii_lowercase();
        let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        if name == "href" && !ALLOWED_PROTOCOLS.iter().any(|p| value.to_ascii_lowercase().starts_with(p)) {
            continue;
        }
        kept.push_str(&format!(" {}=\"{}\"", name, value.replace('"', "&quot;").replace('<', "&lt;")));
    }
    format!("<a{}>", kept)
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// Strips every tag outside a small inline whitelist, keeping the text.
/// Whitelisted tags lose their attributes except a link's href and title.
/// Angle brackets left in the text are escaped, so removing a tag can never
/// splice a new one together from the pieces around it.
pub fn sanitize_html(input: &str) -> String {
    let without_comments = COMMENT.replace_all(input, "");
    let mut out = String::with_capacity(without_comments.len());
    let mut last = 0;

    for caps in TAG.captures_iter(&without_comments) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        escape_text(&without_comments[last..whole.start], &mut out);
        last = whole.end;

        let closing = &caps[1];
        let name = caps[2].to_ascii_lowercase();
        if !ALLOWED_TAGS.contains(&name.as_str()) {
            continue;
        }
        if closing.is_empty() && name == "a" {
            out.push_str(&rebuild_link(&caps[3]));
        } else {
            out.push_str(&format!("<{}{}>", closing, name));
        }
    }
    escape_text(&without_comments[last..], &mut out);
    out
}

#[derive(Debug, Clone, Serialize)]
pub struct AdviserView {
    pub id: i64,
    pub title: Option<String>,
    pub title_certificate: String,
    pub avatar: Option<String>,
    pub name: String,
    pub success_ratio: Decimal,
    pub accumulate_profit_ratio: Decimal,
    pub fans: i64,
    pub is_follow: bool,
    pub is_sign_contract: bool,
}

impl AdviserView {
    pub fn new(card: AdviserCard, membership: &Membership) -> Self {
        Self {
            is_follow: membership.follows(card.id),
            is_sign_contract: membership.has_contract(card.id),
            id: card.id,
            title: card.title,
            title_certificate: card.title_certificate,
            avatar: card.avatar,
            name: card.name,
            success_ratio: card.success_ratio,
            accumulate_profit_ratio: card.accumulate_profit_ratio,
            fans: card.fans,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioView {
    pub id: i64,
    pub uuid: Option<String>,
    pub name: String,
    pub accumulate_profit_ratio: Decimal,
    pub topics: String,
    pub note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invest_adviser: Option<AdviserBrief>,
    pub success_ratio: Decimal,
    pub hold: i64,
    pub is_subscribe: bool,
}

impl PortfolioView {
    pub fn new(portfolio: Portfolio, adviser: Option<AdviserBrief>, membership: &Membership) -> Self {
        Self {
            is_subscribe: membership.subscribes(portfolio.id),
            id: portfolio.id,
            uuid: portfolio.uuid,
            name: portfolio.name,
            accumulate_profit_ratio: portfolio.accumulate_ratio,
            topics: portfolio.topics,
            note: portfolio.note,
            invest_adviser: adviser,
            success_ratio: portfolio.success_ratio,
            // Holdings are not tracked yet.
            hold: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationView {
    pub id: i64,
    pub sec_idxid: String,
    pub buy_daytime: DateTime<Utc>,
    pub buy_price: Decimal,
    pub sell_daytime: Option<DateTime<Utc>>,
    pub sell_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invest_adviser: Option<AdviserBrief>,
}

impl RecommendationView {
    pub fn new(recommendation: Recommendation, adviser: Option<AdviserBrief>) -> Self {
        Self {
            id: recommendation.id,
            sec_idxid: recommendation.sec_idxid,
            buy_daytime: recommendation.buy_daytime,
            buy_price: recommendation.buy_price,
            sell_daytime: recommendation.sell_daytime,
            sell_price: recommendation.sell_price,
            invest_adviser: adviser,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewpointView {
    pub id: i64,
    pub title: String,
    pub digest: String,
    pub content: String,
    pub pub_daytime: Option<DateTime<Utc>>,
    pub sub_picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invest_adviser: Option<AdviserBrief>,
    pub html5: String,
}

pub fn viewpoint_url(public_base_url: &str, viewpoint_id: i64) -> String {
    format!(
        "{}/invest_viewpoint_info/{}/",
        public_base_url.trim_end_matches('/'),
        viewpoint_id
    )
}

impl ViewpointView {
    pub fn new(viewpoint: Viewpoint, adviser: Option<AdviserBrief>, public_base_url: &str) -> Self {
        Self {
            html5: viewpoint_url(public_base_url, viewpoint.id),
            content: sanitize_html(&viewpoint.content),
            id: viewpoint.id,
            title: viewpoint.title,
            digest: viewpoint.digest,
            pub_daytime: viewpoint.pub_daytime,
            sub_picture: viewpoint.sub_picture,
            invest_adviser: adviser,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentUserView {
    pub id: i64,
    pub nick_name: String,
    pub username: String,
    pub mobile: String,
    pub avatar: Option<String>,
    pub gender: Gender,
    pub gender_cn: &'static str,
}

impl From<User> for CurrentUserView {
    fn from(user: User) -> Self {
        Self {
            gender_cn: user.gender.label(),
            id: user.id,
            nick_name: user.nick_name,
            username: user.username,
            mobile: user.mobile,
            avatar: user.avatar,
            gender: user.gender,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdviserResume {
    pub experience: String,
    pub good_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_unknown_tags() {
        let html = r#"<p>Buy <b>now</b><script>alert(1)</script></p><!-- note -->"#;
        assert_eq!(sanitize_html(html), "Buy <b>now</b>alert(1)");
    }

    #[test]
    fn test_sanitize_keeps_safe_links() {
        let html = r#"<a href="https://example.com" onclick="x()">site</a> <a href="javascript:x()">bad</a>"#;
        assert_eq!(
            sanitize_html(html),
            r#"<a href="https://example.com">site</a> <a>bad</a>"#
        );
    }

    #[test]
    fn test_sanitize_drops_attributes() {
        assert_eq!(sanitize_html(r#"<STRONG class="x">a</STRONG>"#), "<strong>a</strong>");
    }

    #[test]
    fn test_sanitize_nested_tags_cannot_rebuild_script() {
        let cleaned = sanitize_html("<<x>script>alert(1)<</x>/script>");
        assert!(!cleaned.contains("<script"));
        assert_eq!(cleaned, "&lt;script&gt;alert(1)&lt;/script&gt;");

        let cleaned = sanitize_html("<scr<!-- -->ipt>alert(1)</scr<b></b>ipt>");
        assert!(!cleaned.contains("<script"));
        assert!(!cleaned.contains("</script"));
    }

    #[test]
    fn test_sanitize_escapes_stray_brackets() {
        assert_eq!(sanitize_html("1 < 2 > 0 <em>ok</em>"), "1 &lt; 2 &gt; 0 <em>ok</em>");
    }

    #[test]
    fn test_viewpoint_url() {
        assert_eq!(
            viewpoint_url("https://api.example.com/", 7),
            "https://api.example.com/invest_viewpoint_info/7/"
        );
    }

    #[test]
    fn test_adviser_scoped_lists_omit_owner() {
        let view = RecommendationView::new(
            Recommendation {
                id: 1,
                owner_id: 2,
                sec_idxid: "SZSE.000001".to_string(),
                buy_daytime: Utc::now(),
                buy_price: Decimal::ONE,
                sell_daytime: None,
                sell_price: None,
                ctime: Utc::now(),
                curdate_ratio: Decimal::ZERO,
                week_ratio: Decimal::ZERO,
                month_ratio: Decimal::ZERO,
                accumulate_ratio: Decimal::ZERO,
            },
            None,
        );
        let json = serde_json::to_value(view).unwrap();
        assert!(json.get("invest_adviser").is_none());
        assert_eq!(json["sec_idxid"], "SZSE.000001");
    }
}
