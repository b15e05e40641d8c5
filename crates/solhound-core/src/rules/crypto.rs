//! Cryptographic-primitive misuse rules: BN254/BLS identity points, rogue
//! key registration, ECDSA malleability, ZK verification gaps and L2
//! precompile costs.

use anyhow::Result;

use crate::matcher::text;
use crate::model::entity::EntityRef;
use crate::model::ir::Function;
use crate::predicates;
use crate::report::model::Finding;
use crate::rules::catalog::{Confidence, Family, Rule, RuleContext, RuleMeta, Severity};

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(Bn254ZeroPoint),
        Box::new(RogueKey),
        Box::new(SigMalleability),
        Box::new(ZkVerificationGap),
        Box::new(PrecompileGas),
    ]
}

const CRYPTO_PATTERNS: &[&str] = &[
    "bn254",
    "bls",
    "g1point",
    "g2point",
    "pairing",
    "verifysignature",
    "verifyproof",
    "aggregate",
    "ecadd",
    "ecmul",
    "ecpairing",
];

const POINT_PARAM_NAMES: &[&str] = &["key", "point", "sig", "pub", "g1", "g2"];

const ZK_PATTERNS: &[&str] = &["verify", "proof", "groth16", "plonk", "snark", "stark"];

const ECC_PRECOMPILES: &[&str] = &["ecadd", "ecmul", "ecpairing", "ecrecover", "modexp"];

pub struct Bn254ZeroPoint;

static ZERO_POINT_META: RuleMeta = RuleMeta {
    id: "crypto-bn254-zero-point",
    family: Family::Crypto,
    help: "BN254/BLS zero point (0,0) may bypass signature verification",
    severity: Severity::Critical,
    confidence: Confidence::Medium,
    remediation: Some(
        "Reject the identity element before verifying: require(point.x != 0 || point.y != 0)",
    ),
};

impl Bn254ZeroPoint {
    /// Point parameters are conventionally `uint256[2]` (G1) or
    /// `uint256[4]` (G2) arrays with a key/point-flavored name.
    fn handles_crypto(function: &Function) -> bool {
        if predicates::is_name_like(&function.name, CRYPTO_PATTERNS) {
            return true;
        }
        let has_point_param = function.parameters.iter().any(|param| {
            text::contains_any(&param.type_name, &["uint256[2]", "uint256[4]"])
                && text::contains_any(&param.name, POINT_PARAM_NAMES)
        });
        has_point_param || predicates::calls_any(function, CRYPTO_PATTERNS)
    }

    fn has_zero_check(function: &Function) -> bool {
        predicates::body_contains_any(
            function,
            &[
                "!= 0",
                "!= 0x0",
                "!= address(0)",
                "> 0",
                "point.x != 0",
                "point.y != 0",
            ],
        )
    }
}

impl Rule for Bn254ZeroPoint {
    fn meta(&self) -> &'static RuleMeta {
        &ZERO_POINT_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            if !Self::handles_crypto(function) {
                continue;
            }
            if !Self::has_zero_check(function) {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "handles BN254/BLS points but may not validate against the zero point (0,0), the identity element that bypasses signature verification",
                ));
            }
        }

        Ok(findings)
    }
}

pub struct RogueKey;

static ROGUE_KEY_META: RuleMeta = RuleMeta {
    id: "crypto-rogue-key",
    family: Family::Crypto,
    help: "Missing proof-of-possession for BLS key registration",
    severity: Severity::High,
    confidence: Confidence::Low,
    remediation: Some(
        "Require a proof-of-possession (a signature over the key and the registrant) when registering BLS keys",
    ),
};

impl RogueKey {
    fn is_key_registration(function: &Function) -> bool {
        predicates::is_name_like(
            &function.name,
            &["register", "setkey", "addkey", "updatekey", "setpublic"],
        ) && predicates::has_param_named(
            function,
            &["key", "pubkey", "public", "g1", "g2"],
        )
    }

    fn has_pop_verification(function: &Function) -> bool {
        predicates::body_contains_any(function, &["verify", "proof", "signature", "pop"])
            || predicates::has_param_named(
                function,
                &["proof", "signature", "pop", "attestation"],
            )
    }
}

impl Rule for RogueKey {
    fn meta(&self) -> &'static RuleMeta {
        &ROGUE_KEY_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            if Self::is_key_registration(function) && !Self::has_pop_verification(function) {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "registers BLS/BN254 keys without proof-of-possession, enabling rogue key attacks on aggregate signatures",
                ));
            }
        }

        Ok(findings)
    }
}

pub struct SigMalleability;

static MALLEABILITY_META: RuleMeta = RuleMeta {
    id: "crypto-sig-malleability",
    family: Family::Crypto,
    help: "ECDSA signature may be malleable (s-value not restricted to lower half)",
    severity: Severity::Medium,
    confidence: Confidence::Medium,
    remediation: Some(
        "Use a vetted ECDSA recovery library or enforce s in the lower half of the curve order",
    ),
};

impl SigMalleability {
    fn has_malleability_check(function: &Function) -> bool {
        function.nodes.iter().any(|node| {
            text::contains_any(&node.text, &["s <", "s <=", "ecdsa.recover", "ecdsa.tryrecover"])
                || (text::contains_any(&node.text, &["secp256k1"])
                    && text::contains_any(&node.text, &["div"]))
        })
    }
}

impl Rule for SigMalleability {
    fn meta(&self) -> &'static RuleMeta {
        &MALLEABILITY_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            for (index, node) in function.nodes.iter().enumerate() {
                if !text::contains_any(&node.text, &["ecrecover"]) {
                    continue;
                }
                if !Self::has_malleability_check(function) {
                    findings.push(Finding::new(
                        self.meta(),
                        EntityRef::node(ctx.contract, function, index),
                        "uses ecrecover without s-value malleability protection",
                    ));
                }
            }
        }

        Ok(findings)
    }
}

pub struct ZkVerificationGap;

static ZK_GAP_META: RuleMeta = RuleMeta {
    id: "crypto-zk-verification-gap",
    family: Family::Crypto,
    help: "ZK proof verification may have gaps",
    severity: Severity::High,
    confidence: Confidence::Low,
    remediation: Some("Check the verifier's return value and validate every public input"),
};

impl ZkVerificationGap {
    fn handles_zk(function: &Function) -> bool {
        predicates::is_name_like(&function.name, ZK_PATTERNS)
            || predicates::has_param_named(function, &["proof"])
    }
}

impl Rule for ZkVerificationGap {
    fn meta(&self) -> &'static RuleMeta {
        &ZK_GAP_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            if !Self::handles_zk(function) {
                continue;
            }

            let checks_result = function.nodes.iter().any(|node| {
                text::contains_any(&node.text, &["require"])
                    && text::contains_any(&node.text, &["verify"])
            });
            let has_revert = predicates::body_contains_any(function, &["revert"]);

            if !checks_result && !has_revert {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "ZK verification result may not be checked",
                ));
            }
        }

        Ok(findings)
    }
}

pub struct PrecompileGas;

static PRECOMPILE_META: RuleMeta = RuleMeta {
    id: "crypto-precompile-gas-l2",
    family: Family::Crypto,
    help: "Cryptographic precompile may exceed gas limits on some L2s",
    severity: Severity::Medium,
    confidence: Confidence::Low,
    remediation: Some(
        "Test precompile-heavy paths on every target L2 and budget for their higher gas costs",
    ),
};

impl Rule for PrecompileGas {
    fn meta(&self) -> &'static RuleMeta {
        &PRECOMPILE_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            let uses: usize = function
                .nodes
                .iter()
                .map(|node| {
                    ECC_PRECOMPILES
                        .iter()
                        .filter(|p| text::contains_any(&node.text, &[**p]))
                        .count()
                })
                .sum();

            if uses > 0 {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    format!("uses {uses} ECC precompile(s) which may have higher gas costs on L2"),
                ));
            }
        }

        Ok(findings)
    }
}
