mod handle_validator_tests;
mod profile_store_tests;
