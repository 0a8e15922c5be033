//! Deterministic test data for data-driven loan application runs.
//!
//! Random generation is seeded so a failing scenario can be replayed with
//! the same `--seed`.
//!
//! # Example
//!
//! ```ignore
//! let mut data = TestDataProvider::with_seed(Seed::from_u64(12345));
//! for app in data.data_for(TestType::Load) {
//!     automator.process_loan_application(&app).await;
//! }
//! ```

use crate::models::{EmploymentType, FinancialInfo, LoanApplication, LoanPurpose, PersonalInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Applications generated by [`TestType::Load`]
pub const LOAD_BATCH_SIZE: usize = 10;

const FIRST_NAMES: &[&str] = &[
    "John",
    "Jane",
    "Michael",
    "Sarah",
    "David",
    "Emily",
    "Christopher",
    "Jessica",
];
const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis",
];
const DOMAINS: &[&str] = &["example.com", "test.com", "sample.org", "demo.net"];
const EMPLOYERS: &[&str] = &[
    "Tech Solutions Inc",
    "Global Corp",
    "Innovation Labs",
    "Digital Dynamics",
    "Enterprise Systems",
    "Creative Agency",
    "Data Analytics Co",
    "Software Solutions",
];

/// Deterministic seed for reproducible data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Seed(u64);

impl Seed {
    /// Create a seed from a u64 value
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw seed value
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Simple xorshift64 PRNG
#[derive(Debug, Clone)]
struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    const fn new(seed: Seed) -> Self {
        // Ensure non-zero state
        let state = if seed.0 == 0 { 1 } else { seed.0 };
        Self { state }
    }

    const fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform in `min..=max`
    const fn between(&mut self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        min + (self.next() % (max - min + 1))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn choice<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        let index = self.between(0, items.len() as u64 - 1) as usize;
        &items[index]
    }
}

/// Test suite flavours with their own data sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    /// The default application only
    Smoke,
    /// Every named scenario
    Regression,
    /// A batch of random applications
    Load,
    /// Defaults with one invalid section each
    Negative,
}

impl TestType {
    /// Every test type
    pub const ALL: &'static [Self] = &[Self::Smoke, Self::Regression, Self::Load, Self::Negative];

    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Smoke => "smoke",
            Self::Regression => "regression",
            Self::Load => "load",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown test type '{s}'"))
    }
}

/// Seeded source of loan applications
#[derive(Debug, Clone)]
pub struct TestDataProvider {
    seed: Seed,
    rng: Xorshift64,
    generated: u64,
}

impl Default for TestDataProvider {
    fn default() -> Self {
        Self::with_seed(Seed::default())
    }
}

impl TestDataProvider {
    /// Provider with the default seed
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider with an explicit seed
    #[must_use]
    pub const fn with_seed(seed: Seed) -> Self {
        Self {
            seed,
            rng: Xorshift64::new(seed),
            generated: 0,
        }
    }

    /// Seed this provider started from
    #[must_use]
    pub const fn seed(&self) -> Seed {
        self.seed
    }

    /// Random applications produced so far
    #[must_use]
    pub const fn generated(&self) -> u64 {
        self.generated
    }

    /// Restart the random sequence
    pub const fn reset(&mut self, seed: Seed) {
        self.seed = seed;
        self.rng = Xorshift64::new(seed);
        self.generated = 0;
    }

    /// John Doe with every optional field set
    #[must_use]
    pub fn default_personal_info() -> PersonalInfo {
        PersonalInfo {
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            email: "john.doe@example.com".to_string(),
            phone: "555-123-4567".to_string(),
            date_of_birth: Some("01/01/1990".to_string()),
            ssn: Some("123-45-6789".to_string()),
        }
    }

    /// Full-time at Tech Corp Inc, 75000 a year
    #[must_use]
    pub fn default_financial_info() -> FinancialInfo {
        FinancialInfo {
            annual_income: 75000.0,
            employment_type: EmploymentType::FullTime.to_string(),
            employer: Some("Tech Corp Inc".to_string()),
            monthly_expenses: Some(3000.0),
        }
    }

    /// 25000 for debt consolidation
    #[must_use]
    pub fn default_loan_application() -> LoanApplication {
        LoanApplication {
            personal_info: Self::default_personal_info(),
            financial_info: Self::default_financial_info(),
            loan_amount: 25000.0,
            loan_purpose: LoanPurpose::DebtConsolidation.to_string(),
        }
    }

    /// Default application with `overrides` applied
    #[must_use]
    pub fn create_loan_application(overrides: impl FnOnce(&mut LoanApplication)) -> LoanApplication {
        let mut app = Self::default_loan_application();
        overrides(&mut app);
        app
    }

    /// Random name, matching email, phone, birth date and SSN
    pub fn random_personal_info(&mut self) -> PersonalInfo {
        let first = *self.rng.choice(FIRST_NAMES);
        let last = *self.rng.choice(LAST_NAMES);
        let domain = *self.rng.choice(DOMAINS);
        PersonalInfo {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: format!(
                "{}.{}@{domain}",
                first.to_lowercase(),
                last.to_lowercase()
            ),
            phone: self.phone_number(),
            date_of_birth: Some(self.date_of_birth()),
            ssn: Some(self.ssn()),
        }
    }

    /// Random income in 30000..=150000 with expenses at ~30% of it
    #[allow(clippy::cast_precision_loss)]
    pub fn random_financial_info(&mut self) -> FinancialInfo {
        let income = self.rng.between(30_000, 150_000);
        let employment = *self.rng.choice(EmploymentType::ALL);
        let employer = *self.rng.choice(EMPLOYERS);
        FinancialInfo {
            annual_income: income as f64,
            employment_type: employment.to_string(),
            employer: Some(employer.to_string()),
            monthly_expenses: Some((income * 3 / 120) as f64),
        }
    }

    /// Random application for 5000..=75000
    #[allow(clippy::cast_precision_loss)]
    pub fn random_loan_application(&mut self) -> LoanApplication {
        self.generated += 1;
        let personal_info = self.random_personal_info();
        let financial_info = self.random_financial_info();
        let loan_amount = self.rng.between(5_000, 75_000) as f64;
        let purpose = *self.rng.choice(LoanPurpose::ALL);
        LoanApplication {
            personal_info,
            financial_info,
            loan_amount,
            loan_purpose: purpose.to_string(),
        }
    }

    /// Random application with `overrides` applied
    pub fn random_with(&mut self, overrides: impl FnOnce(&mut LoanApplication)) -> LoanApplication {
        let mut app = self.random_loan_application();
        overrides(&mut app);
        app
    }

    /// Named valid scenarios
    pub fn test_data_sets(&mut self) -> BTreeMap<String, LoanApplication> {
        let mut sets = BTreeMap::new();
        let _ = sets.insert(
            "valid_application".to_string(),
            Self::default_loan_application(),
        );
        let _ = sets.insert(
            "high_income_application".to_string(),
            self.random_with(|app| {
                set_employment(app, 120_000.0, EmploymentType::FullTime, "Senior Executive Corp");
                app.loan_amount = 50_000.0;
            }),
        );
        let _ = sets.insert(
            "self_employed_application".to_string(),
            self.random_with(|app| {
                set_employment(app, 85_000.0, EmploymentType::SelfEmployed, "Self");
                app.loan_amount = 30_000.0;
            }),
        );
        let _ = sets.insert(
            "student_application".to_string(),
            self.random_with(|app| {
                let p = &mut app.personal_info;
                p.first_name = "Alex".to_string();
                p.last_name = "Student".to_string();
                p.email = "alex.student@university.edu".to_string();
                p.phone = "555-999-8888".to_string();
                set_employment(app, 25_000.0, EmploymentType::Student, "Part-time Work");
                app.loan_amount = 10_000.0;
                app.loan_purpose = LoanPurpose::Education.to_string();
            }),
        );
        let _ = sets.insert(
            "business_loan_application".to_string(),
            self.random_with(|app| {
                set_employment(app, 95_000.0, EmploymentType::SelfEmployed, "Business Owner");
                app.loan_amount = 60_000.0;
                app.loan_purpose = LoanPurpose::Business.to_string();
            }),
        );
        let _ = sets.insert(
            "minimal_valid_application".to_string(),
            LoanApplication {
                personal_info: PersonalInfo {
                    first_name: "Min".to_string(),
                    last_name: "Valid".to_string(),
                    email: "min.valid@test.com".to_string(),
                    phone: "555-000-0001".to_string(),
                    date_of_birth: None,
                    ssn: None,
                },
                financial_info: FinancialInfo {
                    annual_income: 35_000.0,
                    employment_type: EmploymentType::FullTime.to_string(),
                    employer: None,
                    monthly_expenses: None,
                },
                loan_amount: 5_000.0,
                loan_purpose: LoanPurpose::Personal.to_string(),
            },
        );
        sets
    }

    /// Default application with one broken section per scenario
    #[must_use]
    pub fn invalid_test_data() -> BTreeMap<String, LoanApplication> {
        let contact = |first: &str, last: &str, email: &str, phone: &str| PersonalInfo {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            date_of_birth: None,
            ssn: None,
        };

        let mut sets = BTreeMap::new();
        let _ = sets.insert(
            "empty_personal_info".to_string(),
            Self::create_loan_application(|app| app.personal_info = contact("", "", "", "")),
        );
        let _ = sets.insert(
            "invalid_email".to_string(),
            Self::create_loan_application(|app| {
                app.personal_info = contact("Test", "User", "invalid-email", "555-123-4567");
            }),
        );
        let _ = sets.insert(
            "invalid_phone".to_string(),
            Self::create_loan_application(|app| {
                app.personal_info = contact("Test", "User", "test@example.com", "123");
            }),
        );
        let _ = sets.insert(
            "zero_income".to_string(),
            Self::create_loan_application(|app| {
                app.financial_info = FinancialInfo {
                    annual_income: 0.0,
                    employment_type: EmploymentType::Unemployed.to_string(),
                    employer: None,
                    monthly_expenses: None,
                };
            }),
        );
        let _ = sets.insert(
            "negative_loan_amount".to_string(),
            Self::create_loan_application(|app| app.loan_amount = -1_000.0),
        );
        let _ = sets.insert(
            "excessive_loan_amount".to_string(),
            Self::create_loan_application(|app| app.loan_amount = 1_000_000.0),
        );
        sets
    }

    /// Applications at the edges of the accepted ranges
    pub fn boundary_test_data(&mut self) -> BTreeMap<String, LoanApplication> {
        let mut sets = BTreeMap::new();
        let _ = sets.insert(
            "minimum_loan".to_string(),
            self.random_with(|app| {
                app.loan_amount = 1_000.0;
                app.financial_info.annual_income = 20_000.0;
                app.financial_info.employment_type = EmploymentType::FullTime.to_string();
            }),
        );
        let _ = sets.insert(
            "maximum_loan".to_string(),
            self.random_with(|app| {
                app.loan_amount = 100_000.0;
                app.financial_info.annual_income = 200_000.0;
                app.financial_info.employment_type = EmploymentType::FullTime.to_string();
            }),
        );
        let _ = sets.insert(
            "edge_case_income".to_string(),
            self.random_with(|app| {
                app.financial_info.annual_income = 50_000.99;
                app.financial_info.employment_type = EmploymentType::FullTime.to_string();
            }),
        );
        sets
    }

    /// Every named scenario: valid, invalid and boundary
    pub fn all_scenarios(&mut self) -> BTreeMap<String, LoanApplication> {
        let mut all = self.test_data_sets();
        all.extend(Self::invalid_test_data());
        all.extend(self.boundary_test_data());
        all
    }

    /// Look up one named scenario
    pub fn scenario(&mut self, name: &str) -> Option<LoanApplication> {
        self.all_scenarios().remove(name)
    }

    /// Data set for a test suite flavour
    pub fn data_for(&mut self, test_type: TestType) -> Vec<LoanApplication> {
        match test_type {
            TestType::Smoke => vec![Self::default_loan_application()],
            TestType::Regression => self.test_data_sets().into_values().collect(),
            TestType::Load => (0..LOAD_BATCH_SIZE)
                .map(|_| self.random_loan_application())
                .collect(),
            TestType::Negative => Self::invalid_test_data().into_values().collect(),
        }
    }

    fn phone_number(&mut self) -> String {
        format!(
            "{}-{}-{}",
            self.rng.between(200, 999),
            self.rng.between(200, 999),
            self.rng.between(1000, 9999)
        )
    }

    fn date_of_birth(&mut self) -> String {
        let year = self.rng.between(1960, 2000);
        let month = self.rng.between(1, 12);
        let day = self.rng.between(1, 28);
        format!("{month:02}/{day:02}/{year}")
    }

    fn ssn(&mut self) -> String {
        format!(
            "{}-{}-{}",
            self.rng.between(100, 999),
            self.rng.between(10, 99),
            self.rng.between(1000, 9999)
        )
    }
}

fn set_employment(app: &mut LoanApplication, income: f64, kind: EmploymentType, employer: &str) {
    let financial = &mut app.financial_info;
    financial.annual_income = income;
    financial.employment_type = kind.to_string();
    financial.employer = Some(employer.to_string());
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod seed_tests {
        use super::*;

        #[test]
        fn test_seed_default() {
            assert_eq!(Seed::default().value(), 0);
            assert_eq!(Seed::from_u64(12345).value(), 12345);
        }

        #[test]
        fn test_xorshift_deterministic() {
            let mut rng1 = Xorshift64::new(Seed::from_u64(42));
            let mut rng2 = Xorshift64::new(Seed::from_u64(42));
            for _ in 0..100 {
                assert_eq!(rng1.next(), rng2.next());
            }
        }

        #[test]
        fn test_zero_seed_still_varies() {
            let mut rng = Xorshift64::new(Seed::default());
            assert_ne!(rng.next(), rng.next());
        }
    }

    mod generator_tests {
        use super::*;

        #[test]
        fn test_same_seed_same_data() {
            let mut a = TestDataProvider::with_seed(Seed::from_u64(7));
            let mut b = TestDataProvider::with_seed(Seed::from_u64(7));
            assert_eq!(a.data_for(TestType::Load), b.data_for(TestType::Load));
            assert_eq!(a.generated(), LOAD_BATCH_SIZE as u64);
        }

        #[test]
        fn test_reset_replays_sequence() {
            let mut data = TestDataProvider::with_seed(Seed::from_u64(99));
            let first = data.random_loan_application();
            data.reset(Seed::from_u64(99));
            assert_eq!(data.random_loan_application(), first);
            assert_eq!(data.generated(), 1);
        }

        #[test]
        fn test_random_personal_info_shape() {
            let mut data = TestDataProvider::with_seed(Seed::from_u64(3));
            let info = data.random_personal_info();
            let expected_email = format!(
                "{}.{}@",
                info.first_name.to_lowercase(),
                info.last_name.to_lowercase()
            );
            assert!(info.email.starts_with(&expected_email));
            assert_eq!(info.phone.len(), 12);
            assert_eq!(info.date_of_birth.as_deref().map(str::len), Some(10));
            assert_eq!(info.ssn.as_deref().map(str::len), Some(11));
        }

        proptest! {
            #[test]
            fn prop_random_applications_stay_in_range(seed in any::<u64>()) {
                let mut data = TestDataProvider::with_seed(Seed::from_u64(seed));
                let app = data.random_loan_application();
                let income = app.financial_info.annual_income;
                prop_assert!((30_000.0..=150_000.0).contains(&income));
                prop_assert!((5_000.0..=75_000.0).contains(&app.loan_amount));
                prop_assert_eq!(
                    app.financial_info.monthly_expenses,
                    Some((income / 40.0).floor())
                );
                prop_assert!(LoanPurpose::ALL.iter().any(|p| p.as_str() == app.loan_purpose));
            }
        }
    }

    mod scenario_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let app = TestDataProvider::default_loan_application();
            assert_eq!(app.personal_info.first_name, "John");
            assert_eq!(app.financial_info.employment_type, "Full-time");
            assert_eq!(app.loan_purpose, "Debt Consolidation");
            assert!((app.loan_amount - 25000.0).abs() < f64::EPSILON);
        }

        #[test]
        fn test_create_loan_application_overrides() {
            let app = TestDataProvider::create_loan_application(|app| {
                app.personal_info.first_name = "Grace".to_string();
                app.loan_amount = 9000.0;
            });
            assert_eq!(app.personal_info.first_name, "Grace");
            assert_eq!(app.personal_info.last_name, "Doe");
            assert_eq!(app.financial_info.employer.as_deref(), Some("Tech Corp Inc"));
        }

        #[test]
        fn test_named_sets() {
            let mut data = TestDataProvider::new();
            let sets = data.test_data_sets();
            assert_eq!(sets.len(), 6);
            let student = &sets["student_application"];
            assert_eq!(student.personal_info.email, "alex.student@university.edu");
            assert_eq!(student.financial_info.employment_type, "Student");
            assert_eq!(student.loan_purpose, "Education");
            assert_eq!(sets["minimal_valid_application"].financial_info.employer, None);
        }

        #[test]
        fn test_invalid_and_boundary_sets() {
            let invalid = TestDataProvider::invalid_test_data();
            assert_eq!(invalid.len(), 6);
            assert_eq!(invalid["invalid_phone"].personal_info.phone, "123");
            assert_eq!(invalid["invalid_phone"].loan_purpose, "Debt Consolidation");

            let mut data = TestDataProvider::new();
            let boundary = data.boundary_test_data();
            assert!((boundary["edge_case_income"].financial_info.annual_income - 50_000.99).abs() < 1e-9);
        }

        #[test]
        fn test_data_for_each_type() {
            let mut data = TestDataProvider::new();
            assert_eq!(data.data_for(TestType::Smoke).len(), 1);
            assert_eq!(data.data_for(TestType::Regression).len(), 6);
            assert_eq!(data.data_for(TestType::Load).len(), LOAD_BATCH_SIZE);
            assert_eq!(data.data_for(TestType::Negative).len(), 6);
        }

        #[test]
        fn test_scenario_lookup() {
            let mut data = TestDataProvider::new();
            assert!(data.scenario("maximum_loan").is_some());
            assert!(data.scenario("zero_income").is_some());
            assert!(data.scenario("nope").is_none());
            assert_eq!(data.all_scenarios().len(), 15);
        }

        #[test]
        fn test_test_type_parse() {
            assert_eq!("LOAD".parse::<TestType>().unwrap(), TestType::Load);
            assert!("soak".parse::<TestType>().is_err());
            assert_eq!(TestType::Negative.to_string(), "negative");
        }
    }
}
