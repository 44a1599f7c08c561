pub mod stabilized_estimator;
