// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # GeNN Model Description
//!
//! Description layer for spiking network models:
//! - Model kinds as plain data (neuron, synapse, current source, custom update, init snippets)
//! - Built-in model library resolvable by name
//! - Populations held in one registry per kind
//! - [`ModelSpec`], the accumulated description that backends generate code from
//!
//! ## Usage
//!
//! ```rust
//! use genn_model::{init_connectivity, MatrixType, ModelSpec, Precision, SynapseGroupBuilder};
//! use genn_model::{NO_PARAMS, NO_VARS};
//!
//! let mut spec = ModelSpec::new("example", Precision::Float);
//! spec.add_neuron_population("Pop", 10, "SpikeSource", NO_PARAMS, NO_VARS).unwrap();
//! spec.add_synapse_population(
//!     SynapseGroupBuilder::new("Self", MatrixType::SPARSE_INDIVIDUALG, "Pop", "Pop")
//!         .weight_update("StaticPulse", NO_PARAMS, [("g", 1.0)])
//!         .connectivity(init_connectivity("OneToOne", NO_PARAMS).unwrap()),
//! )
//! .unwrap();
//! assert_eq!(spec.synapse_populations().len(), 1);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod init;
pub mod models;
pub mod population;
pub mod registry;
pub mod spec;
pub mod types;

pub use error::{GennError, Result};
pub use init::{
    init_connectivity, init_toeplitz_connectivity, init_var, ConnectivityInit, ToeplitzInit,
    VarInit,
};
pub use models::builtin::IntoModel;
pub use models::{
    CurrentSourceModel, CustomUpdateModel, InitSparseConnectivitySnippet,
    InitToeplitzConnectivitySnippet, InitVarSnippet, NeuronModel, PostsynapticModel,
    WeightUpdateModel,
};
pub use population::{
    CurrentSource, CustomUpdate, ExtraGlobalParam, GroupRef, ModelId, NeuronGroup, Population,
    PopulationHandle, PopulationKind, SparseConnectivity, SynapseGroup, VarReference, VarRole,
    VarState,
};
pub use registry::PopulationRegistry;
pub use spec::{
    create_psm_var_ref, create_var_ref, create_wu_post_var_ref, create_wu_pre_var_ref,
    create_wu_var_ref, ModelSpec, SynapseGroupBuilder, DEFAULT_DT, NO_PARAMS, NO_VARS,
};
pub use types::{MatrixType, Precision, VarAccess, VarLocation};
