pub mod chart;
pub mod demographics;
pub mod insights;
pub mod lung;
pub mod panels;
