use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

lazy_static! {
    /// `EXCHANGE.CODE`, e.g. `SZSE.000001`
    pub static ref SEC_IDXID: Regex = Regex::new(r"^[A-Z]+\.[0-9A-Z]+$").unwrap();
    pub static ref USERNAME: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
    pub static ref MOBILE: Regex = Regex::new(r"^\+?[0-9]{5,16}$").unwrap();
}

/// User classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(into = "i16", try_from = "i16")]
#[repr(i16)]
pub enum UserClass {
    Investor = 1,
    Adviser = 2,
    System = 3,
}

impl From<UserClass> for i16 {
    fn from(class: UserClass) -> i16 {
        class as i16
    }
}

impl TryFrom<i16> for UserClass {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(UserClass::Investor),
            2 => Ok(UserClass::Adviser),
            3 => Ok(UserClass::System),
            other => Err(format!("invalid user class: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(into = "i16", try_from = "i16")]
#[repr(i16)]
pub enum Gender {
    Man = 1,
    Woman = 2,
    Secret = 3,
}

impl Gender {
    /// Display label shipped to clients as `gender_cn`
    pub fn label(&self) -> &'static str {
        match self {
            Gender::Man => "男",
            Gender::Woman => "女",
            Gender::Secret => "保密",
        }
    }
}

impl Default for Gender {
    fn default() -> Self {
        Gender::Secret
    }
}

impl From<Gender> for i16 {
    fn from(gender: Gender) -> i16 {
        gender as i16
    }
}

impl TryFrom<i16> for Gender {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Gender::Man),
            2 => Ok(Gender::Woman),
            3 => Ok(Gender::Secret),
            other => Err(format!("invalid gender: {}", other)),
        }
    }
}

/// Review status of an adviser job application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(into = "i16", try_from = "i16")]
#[repr(i16)]
pub enum JobStatus {
    Waiting = 1,
    Passed = 2,
    Rejected = 3,
}

impl From<JobStatus> for i16 {
    fn from(status: JobStatus) -> i16 {
        status as i16
    }
}

impl TryFrom<i16> for JobStatus {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(JobStatus::Waiting),
            2 => Ok(JobStatus::Passed),
            3 => Ok(JobStatus::Rejected),
            other => Err(format!("invalid job status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub user_class: UserClass,
    pub mobile: String,
    pub email: String,
    pub nick_name: String,
    pub avatar: Option<String>,
    pub gender: Gender,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn is_adviser(&self) -> bool {
        self.user_class == UserClass::Adviser
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub user_class: UserClass,
    pub mobile: String,
    pub email: String,
    pub nick_name: String,
    pub avatar: Option<String>,
    pub gender: Gender,
    pub password_hash: String,
}

/// Denormalized per-user counters (the ledger row)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StatisticRecord {
    pub user_id: i64,
    pub fans_count: i64,
    pub followings_count: i64,
    pub sign_contract_count: i64,
    pub recommend_secs_count: i64,
    pub portfolios_count: i64,
    pub portfolios_bysubscribe_count: i64,
    pub viewpoints_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct AdviserInfo {
    pub user_id: i64,
    pub title: Option<String>,
    pub title_certificate: String,
    pub experience: String,
    pub good_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct AdviserKpi {
    pub user_id: i64,
    pub success_ratio: Decimal,
    pub accumulate_profit_ratio: Decimal,
}

/// Adviser row joined with profile, KPI and ledger fans count
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AdviserCard {
    pub id: i64,
    pub title: Option<String>,
    pub title_certificate: String,
    pub avatar: Option<String>,
    pub name: String,
    pub success_ratio: Decimal,
    pub accumulate_profit_ratio: Decimal,
    pub fans: i64,
}

/// Short adviser info embedded in content listings
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct AdviserBrief {
    pub id: i64,
    pub avatar: Option<String>,
    pub name: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Portfolio {
    pub id: i64,
    pub owner_id: i64,
    pub uuid: Option<String>,
    pub name: String,
    pub topics: String,
    pub note: String,
    pub ctime: DateTime<Utc>,
    pub curdate_ratio: Decimal,
    pub week_ratio: Decimal,
    pub month_ratio: Decimal,
    pub accumulate_ratio: Decimal,
    pub success_ratio: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewPortfolio {
    pub owner_id: i64,
    pub uuid: Option<String>,
    pub name: String,
    pub topics: String,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Viewpoint {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub digest: String,
    pub content: String,
    pub pub_daytime: Option<DateTime<Utc>>,
    pub sub_picture: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewViewpoint {
    pub owner_id: i64,
    pub title: String,
    pub digest: String,
    pub content: String,
    pub pub_daytime: Option<DateTime<Utc>>,
    pub sub_picture: Option<String>,
}

/// Stock recommended by an adviser
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Recommendation {
    pub id: i64,
    pub owner_id: i64,
    pub sec_idxid: String,
    pub buy_daytime: DateTime<Utc>,
    pub buy_price: Decimal,
    pub sell_daytime: Option<DateTime<Utc>>,
    pub sell_price: Option<Decimal>,
    pub ctime: DateTime<Utc>,
    pub curdate_ratio: Decimal,
    pub week_ratio: Decimal,
    pub month_ratio: Decimal,
    pub accumulate_ratio: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewRecommendation {
    pub owner_id: i64,
    pub sec_idxid: String,
    pub buy_daytime: DateTime<Utc>,
    pub buy_price: Decimal,
    pub sell_daytime: Option<DateTime<Utc>>,
    pub sell_price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JobApplication {
    pub id: i64,
    pub real_name: String,
    pub phone: String,
    pub title_certificate: String,
    pub status: JobStatus,
    pub ctime: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Batch of ids in `1,2,3` form
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct IdsRequest {
    #[validate(length(min = 1, max = 4096, message = "ids is required"))]
    pub ids: String,
}

#[derive(Debug, Deserialize)]
pub struct ActionQuery {
    pub action: Option<String>,
}

impl ActionQuery {
    pub fn is_cancel(&self) -> bool {
        self.action.as_deref() == Some("cancel")
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct SendSecurityCodeRequest {
    #[validate(regex(path = "MOBILE", message = "invalid mobile"))]
    pub mobile: String,
}

#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct RegisterRequest {
    #[validate(regex(path = "MOBILE", message = "invalid mobile"))]
    pub mobile: String,
    #[validate(length(min = 1, max = 30))]
    pub security_code: String,
    #[validate(length(max = 64))]
    pub nick_name: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct ForgetPasswordRequest {
    #[validate(regex(path = "MOBILE", message = "invalid mobile"))]
    pub mobile: String,
    #[validate(length(min = 1, max = 30))]
    pub security_code: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct SetPasswordRequest {
    #[validate(length(min = 1, max = 30))]
    pub old_passwd: String,
    #[validate(length(min = 1, max = 30))]
    pub new_passwd: String,
}

#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct RebindMobileRequest {
    #[validate(length(max = 30))]
    pub old_mobile: Option<String>,
    #[validate(regex(path = "MOBILE", message = "invalid mobile"))]
    pub new_mobile: String,
    #[validate(length(min = 1, max = 30))]
    pub security_code: String,
}

#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct UpdateBaseInfoRequest {
    #[validate(length(max = 64))]
    pub nick_name: Option<String>,
    pub gender: Option<Gender>,
}

#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct ApplyJobRequest {
    #[validate(length(min = 1, max = 40))]
    pub real_name: String,
    #[validate(length(min = 1, max = 20))]
    pub phone: String,
    #[validate(length(min = 1, max = 60))]
    pub title_certificate: String,
}

#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct CreatePortfolioRequest {
    #[validate(length(max = 100))]
    pub uuid: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub topics: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub note: String,
}

#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct CreateViewpointRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 400))]
    pub digest: String,
    #[serde(default)]
    #[validate(length(max = 20480))]
    pub content: String,
    pub pub_daytime: Option<DateTime<Utc>>,
    #[validate(length(max = 320))]
    pub sub_picture: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct CreateRecommendationRequest {
    #[validate(length(min = 1, max = 20), regex(path = "SEC_IDXID", message = "expected EXCHANGE.CODE"))]
    pub sec_idxid: String,
    pub buy_daytime: DateTime<Utc>,
    pub buy_price: Decimal,
    pub sell_daytime: Option<DateTime<Utc>>,
    pub sell_price: Option<Decimal>,
}
