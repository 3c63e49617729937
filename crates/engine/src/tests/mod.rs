mod helpers;
mod model_tests;
