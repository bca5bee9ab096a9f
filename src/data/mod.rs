/// Data layer: core types, loading, grouping and aggregation.
///
/// Architecture:
/// ```text
///  subject-info.csv          ProcessedData_SubjectNN.csv
///        │                              │
///        ▼                              ▼
///   ┌──────────┐                  ┌──────────┐
///   │  loader   │ SubjectInfo      │  loader   │ Series
///   └──────────┘                  └──────────┘
///        │                              │
///        ▼                              ▼
///   ┌──────────┐                  ┌───────────┐
///   │ classify  │ GroupKey ──────▶ │ aggregate  │ time-binned group means
///   └──────────┘                  └───────────┘
///        │
///        ▼
///   ┌──────────────┐              ┌──────────┐
///   │ demographics  │              │ insights  │ cohort bands, age regression
///   └──────────────┘              └──────────┘
/// ```

pub mod aggregate;
pub mod classify;
pub mod demographics;
pub mod error;
pub mod insights;
pub mod loader;
pub mod model;
