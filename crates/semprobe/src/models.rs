//! Loan application domain models.
//!
//! The interaction layer only reads these; validation lives with the
//! automator ([`crate::automator::validate_application_data`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Applicant identity and contact details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalInfo {
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Email address
    pub email: String,
    /// Phone number, `NNN-NNN-NNNN`
    pub phone: String,
    /// Date of birth, `MM/DD/YYYY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    /// Social security number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssn: Option<String>,
}

/// Applicant income and employment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialInfo {
    /// Annual income
    pub annual_income: f64,
    /// Employment type label as shown in the form
    pub employment_type: String,
    /// Employer name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employer: Option<String>,
    /// Monthly expenses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_expenses: Option<f64>,
}

/// A complete application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    /// Personal section
    pub personal_info: PersonalInfo,
    /// Financial section
    pub financial_info: FinancialInfo,
    /// Requested amount
    pub loan_amount: f64,
    /// Purpose label as shown in the form
    pub loan_purpose: String,
}

/// Render an amount the way the form expects it typed: integral amounts
/// without a fractional part, others as-is.
#[must_use]
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 && amount.abs() < 1e15 {
        format!("{amount:.0}")
    } else {
        amount.to_string()
    }
}

macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant in declaration order
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Label as shown in the form
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labelled_enum! {
    /// Employment types offered by the form
    EmploymentType {
        /// Full-time
        FullTime => "Full-time",
        /// Part-time
        PartTime => "Part-time",
        /// Self-employed
        SelfEmployed => "Self-employed",
        /// Contract
        Contract => "Contract",
        /// Retired
        Retired => "Retired",
        /// Unemployed
        Unemployed => "Unemployed",
        /// Student
        Student => "Student",
    }
}

labelled_enum! {
    /// Loan purposes offered by the form
    LoanPurpose {
        /// Debt consolidation
        DebtConsolidation => "Debt Consolidation",
        /// Home improvement
        HomeImprovement => "Home Improvement",
        /// Medical expenses
        MedicalExpenses => "Medical Expenses",
        /// Business
        Business => "Business",
        /// Personal
        Personal => "Personal",
        /// Education
        Education => "Education",
        /// Vacation
        Vacation => "Vacation",
        /// Auto
        Auto => "Auto",
    }
}

labelled_enum! {
    /// Lifecycle status of an application
    ApplicationStatus {
        /// Not yet submitted
        Draft => "draft",
        /// Submitted, outcome not confirmed
        InProgress => "in_progress",
        /// Submission confirmed by the page
        Submitted => "submitted",
        /// Approved
        Approved => "approved",
        /// Rejected
        Rejected => "rejected",
        /// Waiting for manual review
        PendingReview => "pending_review",
    }
}

/// Result of validating data before it is typed into the form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// No errors
    pub is_valid: bool,
    /// Blocking problems
    pub errors: Vec<String>,
    /// Non-blocking observations
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Build from collected problems
    #[must_use]
    pub fn from_findings(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Outcome of driving one application through the form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionResult {
    /// The page confirmed the submission
    pub success: bool,
    /// Identifier of this automation run
    pub run_id: String,
    /// Identifier assigned by the application, when shown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    /// Status reached
    pub status: ApplicationStatus,
    /// Failure or confirmation detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When the run finished
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_labels() {
        assert_eq!(EmploymentType::SelfEmployed.as_str(), "Self-employed");
        assert_eq!(LoanPurpose::DebtConsolidation.to_string(), "Debt Consolidation");
        assert_eq!(EmploymentType::ALL.len(), 7);
        assert_eq!(LoanPurpose::ALL.len(), 8);
        assert_eq!(
            serde_json::to_string(&ApplicationStatus::PendingReview).unwrap(),
            "\"pending_review\""
        );
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(25000.0), "25000");
        assert_eq!(format_amount(50000.99), "50000.99");
        assert_eq!(format_amount(-1000.0), "-1000");
    }

    #[test]
    fn test_optional_fields_omitted_in_json() {
        let info = PersonalInfo {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "555-123-4567".into(),
            date_of_birth: None,
            ssn: None,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("ssn").is_none());
        let back: PersonalInfo = serde_json::from_value(json).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn test_validation_result_from_findings() {
        assert!(ValidationResult::from_findings(vec![], vec!["w".into()]).is_valid);
        assert!(!ValidationResult::from_findings(vec!["e".into()], vec![]).is_valid);
    }
}
