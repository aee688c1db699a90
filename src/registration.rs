//! Sign-up flow.
//!
//! Registration is a small state machine: pick a role, enter basic account
//! details, and, for shop owners only, enter business details and upload the
//! KYC documents. Each transition validates the record for its step and is
//! only accepted from the step directly before it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    NormalUser,
    ShopOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignupStep {
    ChoosingRole,
    BasicInfo,
    BusinessDetails,
    Documents,
    Ready,
}

impl fmt::Display for SignupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignupStep::ChoosingRole => "role selection",
            SignupStep::BasicInfo => "basic info",
            SignupStep::BusinessDetails => "business details",
            SignupStep::Documents => "document upload",
            SignupStep::Ready => "ready to submit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("{0}")]
    Invalid(String),
    #[error("cannot {action} during {step}")]
    InvalidTransition { step: SignupStep, action: &'static str },
}

fn require(value: &str, field: &'static str) -> Result<(), RegistrationError> {
    if value.trim().is_empty() {
        Err(RegistrationError::MissingField(field))
    } else {
        Ok(())
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|part| !part.is_empty())
        }
        None => false,
    }
}

// CNIC numbers are written #####-#######-#
fn is_cnic(value: &str) -> bool {
    let groups: Vec<&str> = value.split('-').collect();
    groups.len() == 3
        && [5, 7, 1]
            .iter()
            .zip(&groups)
            .all(|(len, group)| group.len() == *len && group.chars().all(|c| c.is_ascii_digit()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BasicInfo {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub phone: String,
    pub city: String,
}

impl BasicInfo {
    pub fn validate(&self) -> Result<(), RegistrationError> {
        require(&self.name, "Name")?;
        require(&self.email, "Email")?;
        require(&self.password, "Password")?;
        require(&self.phone, "Phone")?;
        require(&self.city, "City")?;
        if !looks_like_email(&self.email) {
            return Err(RegistrationError::Invalid("Please enter a valid email address".into()));
        }
        if self.password != self.confirm_password {
            return Err(RegistrationError::PasswordMismatch);
        }
        if !catalog::is_supported_city(&self.city) {
            return Err(RegistrationError::Invalid(format!("Unsupported city '{}'", self.city)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BusinessDetails {
    pub business_name: String,
    pub business_address: String,
    pub business_type: String,
    pub years_in_business: u32,
    pub cnic_number: String,
}

impl BusinessDetails {
    pub fn validate(&self) -> Result<(), RegistrationError> {
        require(&self.business_name, "Business name")?;
        require(&self.business_address, "Business address")?;
        require(&self.business_type, "Business type")?;
        require(&self.cnic_number, "CNIC number")?;
        if !catalog::BUSINESS_TYPES.contains(&self.business_type.as_str()) {
            return Err(RegistrationError::Invalid(format!(
                "Unknown business type '{}'",
                self.business_type
            )));
        }
        if !is_cnic(&self.cnic_number) {
            return Err(RegistrationError::Invalid(
                "CNIC number must look like 12345-1234567-1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KycDocuments {
    pub business_license: Option<UploadedFile>,
    pub cnic_front: Option<UploadedFile>,
    pub cnic_back: Option<UploadedFile>,
}

impl KycDocuments {
    pub fn validate(&self) -> Result<(), RegistrationError> {
        for (label, file) in [
            ("Business license", &self.business_license),
            ("CNIC front", &self.cnic_front),
            ("CNIC back", &self.cnic_back),
        ] {
            match file {
                Some(f) if !f.bytes.is_empty() => {}
                _ => return Err(RegistrationError::MissingField(label)),
            }
        }
        Ok(())
    }

    /// Multipart field name and file for every uploaded document.
    pub fn fields(&self) -> Vec<(&'static str, &UploadedFile)> {
        [
            ("businessLicense", &self.business_license),
            ("cnicFront", &self.cnic_front),
            ("cnicBack", &self.cnic_back),
        ]
        .into_iter()
        .filter_map(|(name, file)| file.as_ref().map(|f| (name, f)))
        .collect()
    }
}

// JSON body of POST /api/auth/register
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalSignup {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub city: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopOwnerApplication {
    pub basic: BasicInfo,
    pub business: BusinessDetails,
    pub documents: KycDocuments,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationRequest {
    Normal(NormalSignup),
    ShopOwner(ShopOwnerApplication),
}

#[derive(Debug, Clone)]
pub struct SignupFlow {
    step: SignupStep,
    role: Option<Role>,
    basic: Option<BasicInfo>,
    business: Option<BusinessDetails>,
    documents: Option<KycDocuments>,
}

impl Default for SignupFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl SignupFlow {
    pub fn new() -> Self {
        Self {
            step: SignupStep::ChoosingRole,
            role: None,
            basic: None,
            business: None,
            documents: None,
        }
    }

    pub fn step(&self) -> SignupStep {
        self.step
    }

    fn expect_step(&self, expected: SignupStep, action: &'static str) -> Result<(), RegistrationError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(RegistrationError::InvalidTransition { step: self.step, action })
        }
    }

    pub fn choose_role(&mut self, role: Role) -> Result<SignupStep, RegistrationError> {
        self.expect_step(SignupStep::ChoosingRole, "choose a role")?;
        self.role = Some(role);
        self.step = SignupStep::BasicInfo;
        Ok(self.step)
    }

    pub fn submit_basic_info(&mut self, info: BasicInfo) -> Result<SignupStep, RegistrationError> {
        self.expect_step(SignupStep::BasicInfo, "submit basic info")?;
        info.validate()?;
        self.basic = Some(info);
        self.step = match self.role {
            Some(Role::ShopOwner) => SignupStep::BusinessDetails,
            _ => SignupStep::Ready,
        };
        Ok(self.step)
    }

    pub fn submit_business_details(&mut self, details: BusinessDetails) -> Result<SignupStep, RegistrationError> {
        self.expect_step(SignupStep::BusinessDetails, "submit business details")?;
        details.validate()?;
        self.business = Some(details);
        self.step = SignupStep::Documents;
        Ok(self.step)
    }

    pub fn submit_documents(&mut self, documents: KycDocuments) -> Result<SignupStep, RegistrationError> {
        self.expect_step(SignupStep::Documents, "upload documents")?;
        documents.validate()?;
        self.documents = Some(documents);
        self.step = SignupStep::Ready;
        Ok(self.step)
    }

    /// Consumes a completed flow. `confirm_password` is dropped here and never
    /// leaves the front end.
    pub fn finish(self) -> Result<RegistrationRequest, RegistrationError> {
        self.expect_step(SignupStep::Ready, "submit the registration")?;
        let missing = RegistrationError::InvalidTransition {
            step: self.step,
            action: "submit the registration",
        };
        let basic = self.basic.ok_or_else(|| missing.clone())?;

        match self.role {
            Some(Role::ShopOwner) => Ok(RegistrationRequest::ShopOwner(ShopOwnerApplication {
                basic,
                business: self.business.ok_or_else(|| missing.clone())?,
                documents: self.documents.ok_or(missing)?,
            })),
            _ => Ok(RegistrationRequest::Normal(NormalSignup {
                name: basic.name,
                email: basic.email,
                password: basic.password,
                phone: basic.phone,
                city: basic.city,
                role: Role::NormalUser,
            })),
        }
    }
}
