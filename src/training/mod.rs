//! Estimators and evaluation
//!
//! Array-in, array-out learners behind the model variants:
//! - CART decision trees and bagged random forests
//! - Multilayer perceptrons (classifier and regressor)
//! - Quadratic discriminant analysis
//! - Hold-out metrics and k-fold cross-validation

pub mod cross_validation;
pub mod decision_tree;
pub mod linalg;
pub mod metrics;
pub mod neural_network;
pub mod qda;
pub mod random_forest;

pub use cross_validation::{train_validation_split, CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use metrics::{roc_auc, ModelMetrics};
pub use neural_network::{Activation, MLPClassifier, MLPConfig, MLPRegressor, NetworkInfo, TrainingHistory};
pub use qda::{ClassStatistics, QdaInfo, QuadraticDiscriminant};
pub use random_forest::{MaxFeatures, RandomForest};
