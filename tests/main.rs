/*!
 * Main test entry point for subwarden test suite
 */

// Import common test utilities
pub mod common;

// Import integration tests
mod integration {
    // End-to-end acquisition runs through all four stages
    pub mod acquisition_pipeline_tests;

    // Provider search, scoring and download interplay
    pub mod provider_download_tests;

    // Repository round trips feeding live components
    pub mod persistence_tests;
}
