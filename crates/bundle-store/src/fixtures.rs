//! Small fitted bundles shaped like the loan-approval, car-price and
//! bankruptcy models, for tests and benchmarks.

use chrono::{TimeZone, Utc};
use feature_encoder::{CategoricalColumn, FeaturePipeline, NumericScaler, RawSample};
use scorer::{DecisionTree, Model, TreeNode};

use crate::bundle::{BundleMetadata, TransformationBundle};

fn names(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

/// Logistic regression over scaled numerics and one-hot categoricals
pub fn loan_bundle() -> TransformationBundle {
    let pipeline = FeaturePipeline::new(
        names(&["LoanAmount", "Loan_Amount_Term", "TotalIncome"]),
        NumericScaler::Standard {
            mean: vec![146.4, 342.0, 7024.7],
            scale: vec![85.6, 65.1, 6458.7],
        },
        vec![
            CategoricalColumn::one_hot("Gender", ["Female", "Male"]),
            CategoricalColumn::one_hot("Married", ["No", "Yes"]),
            CategoricalColumn::one_hot("Dependents", ["0", "1", "2", "3+"]),
            CategoricalColumn::one_hot("Education", ["Graduate", "Not Graduate"]),
            CategoricalColumn::one_hot("Self_Employed", ["No", "Yes"]),
            CategoricalColumn::one_hot("Credit_History", ["0.0", "1.0"]),
            CategoricalColumn::one_hot("Property_Area", ["Rural", "Semiurban", "Urban"]),
        ],
        names(&[
            "Credit_History_0.0",
            "Credit_History_1.0",
            "LoanAmount",
            "Loan_Amount_Term",
            "TotalIncome",
            "Gender_Female",
            "Gender_Male",
            "Married_No",
            "Married_Yes",
            "Dependents_0",
            "Dependents_1",
            "Dependents_2",
            "Dependents_3+",
            "Education_Graduate",
            "Education_Not Graduate",
            "Self_Employed_No",
            "Self_Employed_Yes",
            "Property_Area_Rural",
            "Property_Area_Semiurban",
            "Property_Area_Urban",
        ]),
    )
    .expect("loan pipeline is consistent");

    let model = Model::logistic_regression(
        vec![
            -1.9, 1.7, -0.15, -0.05, 0.1, -0.05, 0.02, -0.3, 0.25, 0.05, -0.1, 0.1, -0.05, 0.2,
            -0.2, 0.0, -0.02, -0.35, 0.45, -0.1,
        ],
        0.1,
    )
    .with_feature_names(pipeline.canonical_order().to_vec());

    let metadata = BundleMetadata {
        name: "loan-approval".to_string(),
        created_at: Utc.with_ymd_and_hms(2025, 11, 3, 10, 0, 0).single(),
        positive_label: Some("Approved".to_string()),
    };

    TransformationBundle::new(metadata, pipeline, model).expect("loan bundle is consistent")
}

/// Sample row from the loan-approval form
pub fn loan_sample() -> RawSample {
    RawSample::new()
        .with("LoanAmount", 150)
        .with("Loan_Amount_Term", 360)
        .with("TotalIncome", 8000)
        .with("Gender", "Male")
        .with("Married", "Yes")
        .with("Dependents", "0")
        .with("Education", "Graduate")
        .with("Self_Employed", "No")
        .with("Credit_History", 1.0)
        .with("Property_Area", "Semiurban")
}

/// Linear regression over unscaled numerics and label-encoded categoricals,
/// with an "Other" fallback on the brand column
pub fn car_price_bundle() -> TransformationBundle {
    let pipeline = FeaturePipeline::new(
        names(&["mileage", "engV", "year"]),
        NumericScaler::Passthrough,
        vec![
            CategoricalColumn::ordinal(
                "car",
                [
                    "Audi",
                    "BMW",
                    "Mercedes-Benz",
                    "Other",
                    "Renault",
                    "Toyota",
                    "Volkswagen",
                ],
            )
            .with_fallback("Other"),
            CategoricalColumn::ordinal(
                "body",
                ["crossover", "hatch", "other", "sedan", "vagon", "van"],
            ),
            CategoricalColumn::ordinal("engType", ["Diesel", "Gas", "Other", "Petrol"]),
            CategoricalColumn::flag("registration", ["yes", "YES", "Yes", "y", "Y"]),
            CategoricalColumn::ordinal("drive", ["front", "full", "rear"]),
        ],
        names(&[
            "car",
            "body",
            "mileage",
            "engV",
            "engType",
            "registration",
            "year",
            "drive",
        ]),
    )
    .expect("car pipeline is consistent");

    let model = Model::linear_regression(
        vec![300.0, 150.0, -20.0, 2500.0, -400.0, 3000.0, 900.0, 500.0],
        -1_800_000.0,
    );

    TransformationBundle::new(BundleMetadata::named("car-price"), pipeline, model)
        .expect("car bundle is consistent")
}

/// Sample row from the car-price form
pub fn car_sample() -> RawSample {
    RawSample::new()
        .with("car", "Toyota")
        .with("body", "sedan")
        .with("mileage", 100)
        .with("engV", 1.8)
        .with("engType", "Petrol")
        .with("registration", "yes")
        .with("year", 2010)
        .with("drive", "front")
}

/// Two-tree random forest over scaled financial ratios
pub fn bankruptcy_bundle() -> TransformationBundle {
    let pipeline = FeaturePipeline::new(
        names(&["roa", "debt_ratio", "current_ratio"]),
        NumericScaler::Standard {
            mean: vec![0.05, 0.45, 1.5],
            scale: vec![0.1, 0.2, 1.0],
        },
        Vec::new(),
        names(&["debt_ratio", "roa", "current_ratio"]),
    )
    .expect("bankruptcy pipeline is consistent");

    let leverage = DecisionTree::new(vec![
        TreeNode::Split {
            feature: 0,
            threshold: 1.5,
            left: 1,
            right: 2,
        },
        TreeNode::Leaf { probability: 0.1 },
        TreeNode::Leaf { probability: 0.9 },
    ]);
    let profitability = DecisionTree::new(vec![
        TreeNode::Split {
            feature: 1,
            threshold: -2.0,
            left: 1,
            right: 2,
        },
        TreeNode::Leaf { probability: 0.85 },
        TreeNode::Split {
            feature: 2,
            threshold: -1.0,
            left: 3,
            right: 4,
        },
        TreeNode::Leaf { probability: 0.6 },
        TreeNode::Leaf { probability: 0.05 },
    ]);

    let metadata = BundleMetadata {
        name: "bankruptcy".to_string(),
        created_at: None,
        positive_label: Some("Bankrupt".to_string()),
    };

    TransformationBundle::new(
        metadata,
        pipeline,
        Model::random_forest(3, vec![leverage, profitability]),
    )
    .expect("bankruptcy bundle is consistent")
}

/// A financially healthy company
pub fn bankruptcy_sample() -> RawSample {
    RawSample::new()
        .with("roa", 0.08)
        .with("debt_ratio", 0.4)
        .with("current_ratio", 1.8)
}
