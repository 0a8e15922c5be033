//! Semprobe: resilient end-to-end interaction for semantics-overlay forms
//!
//! Applications rendered to a canvas expose their controls to the browser
//! only through a semantics overlay of generic nodes whose attributes vary
//! between builds. Semprobe addresses each logical control by an ordered
//! list of candidate selectors, waits until the overlay is actually
//! populated, and reports outcomes as values instead of failing the run on
//! the first missing element.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        SEMPROBE Architecture                     │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌──────────────┐   ┌───────────────┐           │
//! │  │ Automator  │──►│ LoanApp Page │──►│ FormComponent │           │
//! │  └────────────┘   └──────────────┘   └───────┬───────┘           │
//! │                                              ▼                   │
//! │  ┌────────────┐   ┌──────────────┐   ┌───────────────┐           │
//! │  │ Registry   │   │ Readiness    │◄──│ Resolver      │           │
//! │  └────────────┘   └──────┬───────┘   └───────┬───────┘           │
//! │                          ▼                   ▼                   │
//! │                   ┌─────────────────────────────────┐            │
//! │                   │ PageDriver (CdpDriver / Mock)   │            │
//! │                   └─────────────────────────────────┘            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let session = CdpSession::launch(&config).await?;
//! let driver: Arc<dyn PageDriver> = Arc::new(session.new_driver().await?);
//! PageSetup::apply(driver.as_ref(), &config).await?;
//! let automator = LoanApplicationAutomator::from_context(ComponentContext::new(driver, config));
//! let app = create_test_application(|_| {})?;
//! assert!(automator.process_loan_application(&app).await);
//! ```

#![warn(missing_docs)]

#[allow(clippy::missing_errors_doc)]
pub mod automator;
#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc)]
pub mod cdp;
pub mod component;
pub mod config;
pub mod data;
#[allow(clippy::missing_errors_doc)]
pub mod driver;
pub mod form;
pub mod loan_page;
pub mod locator;
#[allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
pub mod mock;
pub mod models;
#[allow(clippy::missing_errors_doc)]
pub mod readiness;
pub mod registry;
pub mod resolver;
mod result;
#[allow(clippy::missing_errors_doc)]
pub mod setup;
pub mod wait;

pub use automator::{
    create_test_application, validate_application, validate_application_data,
    LoanApplicationAutomator,
};
#[cfg(feature = "browser")]
pub use cdp::{CdpDriver, CdpSession};
pub use component::{Component, ComponentContext};
pub use config::{ChallengeConfig, SemprobeConfig, TimingConfig, ViewportConfig};
pub use data::{Seed, TestDataProvider, TestType};
pub use driver::{ActionOptions, PageDriver, Screenshot};
pub use form::{FieldResult, FormComponent};
pub use loan_page::{ApplicationReport, LoanApplicationPage, SectionReport};
pub use locator::{Candidates, FieldStrategies, Selector};
pub use mock::{MockAction, MockDriver, MockElement};
pub use models::{
    ApplicationStatus, EmploymentType, FinancialInfo, LoanApplication, LoanPurpose, PersonalInfo,
    SubmissionResult, ValidationResult,
};
pub use readiness::{ReadinessConfig, ReadinessState, SemanticsReadinessDetector};
pub use registry::{ComponentRegistry, RegistryStats};
pub use resolver::{Action, ElementResolver, InteractionOutcome};
pub use result::{SemprobeError, SemprobeResult};
pub use setup::PageSetup;
pub use wait::{ElementState, LoadState, WaitResult};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for convenient imports
pub mod prelude {
    pub use super::automator::*;
    #[cfg(feature = "browser")]
    pub use super::cdp::*;
    pub use super::component::*;
    pub use super::config::*;
    pub use super::data::*;
    pub use super::driver::*;
    pub use super::form::*;
    pub use super::loan_page::*;
    pub use super::locator::*;
    pub use super::mock::*;
    pub use super::models::*;
    pub use super::readiness::*;
    pub use super::registry::*;
    pub use super::resolver::*;
    pub use super::result::*;
    pub use super::setup::*;
    pub use super::wait::*;
}
