//! Resolution of the contract function a mint call invokes.
//!
//! Custom interface text is untrusted input; it is parsed and validated here,
//! separately from transaction construction.

use alloy::dyn_abi::{DynSolValue, JsonAbiExt, Specifier};
use alloy::json_abi::{Function, JsonAbi};
use alloy::primitives::{Bytes, U256};
use serde_json::Value;

use crate::utils::units::parse_quantity;
use crate::wallet::error::WalletError;

/// Human readable items that are valid ABI but never callable
const NON_FUNCTION_PREFIXES: &[&str] = &["event ", "error ", "constructor", "fallback", "receive"];

/// A fully encoded call: which function, with what arguments
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCall {
    pub function: Function,
    pub args: Vec<DynSolValue>,
    /// Selector followed by the ABI encoded arguments
    pub data: Bytes,
}

/// Parses user supplied interface text.
///
/// Accepted shapes: a JSON ABI array, a JSON array of human readable
/// signatures (`"function mint(uint256 amount) payable"`), or a compiler
/// artifact object holding either under `"abi"`.
///
/// # Errors
/// * `WalletError::InvalidInterface` on malformed text or an interface without functions
pub fn parse_custom_abi(text: &str) -> Result<JsonAbi, WalletError> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| WalletError::InvalidInterface(format!("not valid JSON: {e}")))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut artifact) => match artifact.remove("abi") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(WalletError::InvalidInterface(
                    "expected an array of function signatures".to_string(),
                ))
            }
        },
        _ => {
            return Err(WalletError::InvalidInterface(
                "expected an array of function signatures".to_string(),
            ))
        }
    };

    let abi = if items.iter().all(Value::is_string) {
        parse_human_readable(&items)?
    } else {
        serde_json::from_value::<JsonAbi>(Value::Array(items))
            .map_err(|e| WalletError::InvalidInterface(e.to_string()))?
    };

    if abi.functions.is_empty() {
        return Err(WalletError::InvalidInterface(
            "interface declares no functions".to_string(),
        ));
    }
    Ok(abi)
}

fn parse_human_readable(items: &[Value]) -> Result<JsonAbi, WalletError> {
    let mut abi = JsonAbi::default();

    for signature in items.iter().filter_map(Value::as_str).map(str::trim) {
        if NON_FUNCTION_PREFIXES
            .iter()
            .any(|prefix| signature.starts_with(prefix))
        {
            continue;
        }
        let function = Function::parse(signature)
            .map_err(|e| WalletError::InvalidInterface(format!("{signature}: {e}")))?;
        abi.functions
            .entry(function.name.clone())
            .or_default()
            .push(function);
    }

    Ok(abi)
}

/// Builds the single-function interface used when no custom one is given:
/// `name(uint256)` when minting a positive quantity, `name()` otherwise.
///
/// # Errors
/// * `WalletError::InvalidInterface` if `name` is not a valid identifier
pub fn synthesize(name: &str, with_quantity: bool) -> Result<Function, WalletError> {
    if !is_identifier(name) {
        return Err(WalletError::InvalidInterface(format!(
            "invalid function name {name:?}"
        )));
    }

    let signature = if with_quantity {
        format!("function {name}(uint256 quantity)")
    } else {
        format!("function {name}()")
    };
    Function::parse(&signature).map_err(|e| WalletError::InvalidInterface(e.to_string()))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Parses the optional quantity; blank means none.
///
/// # Errors
/// * `WalletError::InvalidQuantity` for anything but a non-negative integer
pub fn parse_mint_quantity(quantity: Option<&str>) -> Result<Option<U256>, WalletError> {
    let Some(raw) = quantity.map(str::trim).filter(|q| !q.is_empty()) else {
        return Ok(None);
    };
    parse_quantity(raw)
        .map(Some)
        .ok_or_else(|| WalletError::InvalidQuantity(raw.to_string()))
}

/// Picks the function to call and encodes its arguments.
///
/// # Errors
/// * `WalletError::InvalidInterface` if the custom interface is malformed, lacks
///   `function_name`, or the function takes more than one argument
/// * `WalletError::InvalidQuantity` if the quantity does not fit the argument
pub fn resolve_call(
    function_name: &str,
    quantity: Option<&str>,
    custom_abi: Option<&str>,
) -> Result<ResolvedCall, WalletError> {
    let function_name = function_name.trim();
    let quantity = parse_mint_quantity(quantity)?;
    let positive = quantity.is_some_and(|q| !q.is_zero());

    let (function, args) = match custom_abi.map(str::trim).filter(|abi| !abi.is_empty()) {
        Some(text) => {
            let abi = parse_custom_abi(text)?;
            let function = pick_overload(&abi, function_name, positive)?;
            let args = custom_args(&function, quantity)?;
            (function, args)
        }
        None => {
            let function = synthesize(function_name, positive)?;
            let args = match quantity {
                Some(q) if positive => vec![DynSolValue::Uint(q, 256)],
                _ => Vec::new(),
            };
            (function, args)
        }
    };

    let data = function
        .abi_encode_input(&args)
        .map_err(|e| WalletError::InvalidInterface(e.to_string()))?;

    Ok(ResolvedCall {
        function,
        args,
        data: data.into(),
    })
}

/// Prefers the one-argument overload when minting a quantity and the
/// zero-argument one otherwise, falling back to the first declared.
fn pick_overload(abi: &JsonAbi, name: &str, positive: bool) -> Result<Function, WalletError> {
    let overloads = abi
        .function(name)
        .filter(|overloads| !overloads.is_empty())
        .ok_or_else(|| {
            WalletError::InvalidInterface(format!("function {name} not found in interface"))
        })?;

    let wanted = usize::from(positive);
    Ok(overloads
        .iter()
        .find(|f| f.inputs.len() == wanted)
        .unwrap_or(&overloads[0])
        .clone())
}

fn custom_args(function: &Function, quantity: Option<U256>) -> Result<Vec<DynSolValue>, WalletError> {
    match function.inputs.as_slice() {
        [] => Ok(Vec::new()),
        [param] => {
            let quantity = quantity.ok_or_else(|| {
                WalletError::InvalidQuantity(format!("{} expects an argument", function.name))
            })?;
            let ty = param
                .resolve()
                .map_err(|e| WalletError::InvalidInterface(e.to_string()))?;
            let value = ty
                .coerce_str(&quantity.to_string())
                .map_err(|e| WalletError::InvalidQuantity(format!("{quantity} as {}: {e}", param.ty)))?;
            Ok(vec![value])
        }
        inputs => Err(WalletError::InvalidInterface(format!(
            "{} takes {} arguments, only zero or one are supported",
            function.name,
            inputs.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesized_without_quantity_takes_no_arguments() {
        let call = resolve_call("mint", Some("0"), None).unwrap();
        assert!(call.function.inputs.is_empty());
        assert!(call.args.is_empty());
        assert_eq!(call.data.as_ref(), call.function.selector().as_slice());

        let call = resolve_call("mint", None, None).unwrap();
        assert!(call.args.is_empty());
    }

    #[test]
    fn test_synthesized_with_quantity_takes_one_uint() {
        let call = resolve_call("mint", Some("3"), None).unwrap();
        assert_eq!(call.function.signature(), "mint(uint256)");
        assert_eq!(call.args, vec![DynSolValue::Uint(U256::from(3), 256)]);
        // selector + one 32 byte word
        assert_eq!(call.data.len(), 4 + 32);
        assert_eq!(call.data[35], 3);
    }

    #[test]
    fn test_invalid_function_name() {
        for name in ["", "1mint", "mint()", "mint me"] {
            assert!(matches!(
                resolve_call(name, None, None),
                Err(WalletError::InvalidInterface(_))
            ));
        }
    }

    #[test]
    fn test_invalid_quantity() {
        assert!(matches!(
            resolve_call("mint", Some("three"), None),
            Err(WalletError::InvalidQuantity(_))
        ));
        assert!(matches!(
            resolve_call("mint", Some("-1"), None),
            Err(WalletError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn test_custom_json_abi_overrides_synthesized() {
        let abi = r#"[{"type":"function","name":"publicMint","inputs":[{"name":"amount","type":"uint8"}],"outputs":[],"stateMutability":"payable"}]"#;

        let call = resolve_call("publicMint", Some("2"), Some(abi)).unwrap();
        assert_eq!(call.function.signature(), "publicMint(uint8)");
        assert_eq!(call.args, vec![DynSolValue::Uint(U256::from(2), 8)]);
    }

    #[test]
    fn test_custom_human_readable_abi() {
        let abi = r#"["event Minted(address to)", "function claim()", "function claim(uint256 amount)"]"#;

        let call = resolve_call("claim", None, Some(abi)).unwrap();
        assert!(call.function.inputs.is_empty());

        let call = resolve_call("claim", Some("5"), Some(abi)).unwrap();
        assert_eq!(call.function.signature(), "claim(uint256)");
    }

    #[test]
    fn test_custom_abi_from_artifact() {
        let artifact = r#"{"contractName":"Drop","abi":["function mint()"]}"#;
        assert!(resolve_call("mint", None, Some(artifact)).is_ok());
    }

    #[test]
    fn test_malformed_custom_abi() {
        for abi in [
            "function mint(",
            r#"{"name": "mint"}"#,
            r#"["function mint(uint256"]"#,
            r#"[{"type":"function","name":"mint","inputs":"nope"}]"#,
            r#"["event Minted(address to)"]"#,
        ] {
            assert!(
                matches!(
                    resolve_call("mint", None, Some(abi)),
                    Err(WalletError::InvalidInterface(_))
                ),
                "{abi} should be rejected"
            );
        }
    }

    #[test]
    fn test_custom_abi_missing_function() {
        let err = resolve_call("mint", None, Some(r#"["function claim()"]"#)).unwrap_err();
        assert_eq!(
            err,
            WalletError::InvalidInterface("function mint not found in interface".to_string())
        );
    }

    #[test]
    fn test_custom_abi_argument_requirements() {
        let one_arg = r#"["function mint(uint256 amount)"]"#;
        assert!(matches!(
            resolve_call("mint", None, Some(one_arg)),
            Err(WalletError::InvalidQuantity(_))
        ));

        let two_args = r#"["function mint(address to, uint256 amount)"]"#;
        assert!(matches!(
            resolve_call("mint", Some("1"), Some(two_args)),
            Err(WalletError::InvalidInterface(_))
        ));

        let address_arg = r#"["function mint(address to)"]"#;
        assert!(matches!(
            resolve_call("mint", Some("3"), Some(address_arg)),
            Err(WalletError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn test_blank_custom_abi_is_ignored() {
        let call = resolve_call("mint", Some("1"), Some("   ")).unwrap();
        assert_eq!(call.function.signature(), "mint(uint256)");
    }
}
