//! # CRD Generator
//!
//! Prints the CustomResourceDefinition YAML of every resource the controller
//! reads or writes.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/lifecycle.keptn.sh.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::core::CustomResourceExt;
use lifecycle_controller::crd::{
    KeptnAppVersion, KeptnEvaluationDefinition, KeptnEvaluationProvider, KeptnTask,
    KeptnWorkloadInstance,
};

fn main() {
    let crds = [
        KeptnAppVersion::crd(),
        KeptnTask::crd(),
        KeptnWorkloadInstance::crd(),
        KeptnEvaluationDefinition::crd(),
        KeptnEvaluationProvider::crd(),
    ];

    println!("# This file is auto-generated by crdgen");
    println!("# DO NOT EDIT THIS FILE MANUALLY");
    println!("#");
    for crd in &crds {
        match serde_yaml::to_string(crd) {
            Ok(yaml) => {
                println!("---");
                print!("{yaml}");
            }
            Err(e) => {
                eprintln!("Failed to serialize CRD to YAML: {e}");
                std::process::exit(1);
            }
        }
    }
}
