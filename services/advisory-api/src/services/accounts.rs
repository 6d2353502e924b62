use super::AdvisoryService;
use crate::errors::{ApiError, Result};
use crate::models::{
    ApplyJobRequest, ForgetPasswordRequest, Gender, JobApplication, NewUser, RebindMobileRequest,
    RegisterRequest, SendSecurityCodeRequest, SetPasswordRequest, UpdateBaseInfoRequest, User, UserClass,
    USERNAME,
};
use crate::password::{hash_password, verify_password};
use crate::presenters::CurrentUserView;
use crate::store::NewJobApplication;
use tracing::info;
use validator::Validate;

impl AdvisoryService {
    /// Creates the user and its statistic record in one step.
    pub async fn create_user(&self, user: NewUser) -> Result<User> {
        if user.username.is_empty() || user.username.len() > 64 || !USERNAME.is_match(&user.username) {
            return Err(ApiError::Validation("username: invalid username".to_string()));
        }
        self.store.create_user(user).await
    }

    /// Removes the user and every row that counts towards or against it.
    pub async fn delete_user(&self, user_id: i64) -> Result<()> {
        if !self.store.delete_user(user_id).await? {
            return Err(ApiError::NotFound("user".to_string()));
        }
        Ok(())
    }

    pub async fn current_user(&self, user_id: i64) -> Result<CurrentUserView> {
        Ok(self.acting_user(user_id).await?.into())
    }

    /// Returns the TTL of the issued code in seconds.
    pub async fn send_security_code(&self, request: SendSecurityCodeRequest) -> Result<u64> {
        request.validate()?;
        self.codes.issue(request.mobile.trim()).await?;
        Ok(self.codes.ttl_secs())
    }

    async fn check_code(&self, mobile: &str, code: &str) -> Result<()> {
        if !self.codes.verify(mobile, code).await? {
            return Err(ApiError::Validation("security_code: invalid security code".to_string()));
        }
        Ok(())
    }

    /// Registers an investor named `mob_{mobile}`.
    pub async fn register(&self, request: RegisterRequest) -> Result<CurrentUserView> {
        request.validate()?;
        let mobile = request.mobile.trim().to_string();

        if self.store.find_user_by_mobile(&mobile).await?.is_some() {
            return Err(ApiError::Validation("mobile: mobile already registered".to_string()));
        }
        self.check_code(&mobile, &request.security_code).await?;

        let user = self
            .create_user(NewUser {
                username: format!("mob_{}", mobile),
                user_class: UserClass::Investor,
                mobile: mobile.clone(),
                email: String::new(),
                nick_name: request
                    .nick_name
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_default(),
                avatar: None,
                gender: Gender::default(),
                password_hash: hash_password(&request.password)?,
            })
            .await?;
        self.codes.consume(&mobile).await?;

        info!(user_id = user.id, "investor registered");
        Ok(user.into())
    }

    pub async fn forget_password(&self, request: ForgetPasswordRequest) -> Result<()> {
        request.validate()?;
        let mobile = request.mobile.trim();

        let user = self
            .store
            .find_user_by_mobile(mobile)
            .await?
            .ok_or_else(|| ApiError::Validation(format!("mobile: no user with mobile {}", mobile)))?;
        self.check_code(mobile, &request.security_code).await?;

        self.store
            .set_password_hash(user.id, &hash_password(&request.password)?)
            .await?;
        self.codes.consume(mobile).await?;

        info!(user_id = user.id, "password reset by security code");
        Ok(())
    }

    pub async fn set_password(&self, user_id: i64, request: SetPasswordRequest) -> Result<()> {
        request.validate()?;
        let user = self.acting_user(user_id).await?;

        if user.password_hash.is_empty() || !verify_password(&request.old_passwd, &user.password_hash)? {
            return Err(ApiError::Validation("old_passwd: old password is incorrect".to_string()));
        }

        self.store
            .set_password_hash(user.id, &hash_password(&request.new_passwd)?)
            .await?;
        info!(user_id, "password changed");
        Ok(())
    }

    /// The current mobile, when one is bound, must be confirmed.
    pub async fn rebind_mobile(&self, user_id: i64, request: RebindMobileRequest) -> Result<()> {
        request.validate()?;
        let user = self.acting_user(user_id).await?;
        let new_mobile = request.new_mobile.trim();

        if !user.mobile.trim().is_empty() {
            match request.old_mobile.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
                Some(old) if old == user.mobile.trim() => {}
                Some(_) => return Err(ApiError::Validation("old_mobile: old mobile does not match".to_string())),
                None => return Err(ApiError::Validation("old_mobile: old mobile is required".to_string())),
            }
        }

        if let Some(owner) = self.store.find_user_by_mobile(new_mobile).await? {
            if owner.id != user.id {
                return Err(ApiError::Validation("new_mobile: mobile already registered".to_string()));
            }
        }
        self.check_code(new_mobile, &request.security_code).await?;

        self.store.set_mobile(user.id, new_mobile).await?;
        self.codes.consume(new_mobile).await?;

        info!(user_id, "mobile rebound");
        Ok(())
    }

    /// Empty values leave the stored field untouched.
    pub async fn update_base_info(&self, user_id: i64, request: UpdateBaseInfoRequest) -> Result<CurrentUserView> {
        request.validate()?;
        self.acting_user(user_id).await?;

        let nick_name = request
            .nick_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let user = self.store.update_profile(user_id, nick_name, request.gender).await?;
        Ok(user.into())
    }

    pub async fn apply_adviser_job(&self, request: ApplyJobRequest) -> Result<JobApplication> {
        request.validate()?;

        let application = self
            .store
            .create_job_application(NewJobApplication {
                real_name: request.real_name.trim().to_string(),
                phone: request.phone.trim().to_string(),
                title_certificate: request.title_certificate.trim().to_string(),
            })
            .await?;

        info!(application_id = application.id, "adviser job application received");
        Ok(application)
    }
}
