mod support;

mod preference_tests;
mod provider_tests;
mod scheduler_tests;
