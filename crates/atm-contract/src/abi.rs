//! ABI artifact parsing and the slice of the Solidity ABI codec the ATM
//! contract needs: selectors and unsigned integer words.

use crate::ContractError;
use alloy_json_abi::{JsonAbi, Param};
use alloy_primitives::{Selector, U256, hex, keccak256};
use serde_json::Value;

/// Parsed interface description.
#[derive(Debug, Clone)]
pub struct Abi {
    inner: JsonAbi,
}

impl Abi {
    /// Accepts a Hardhat/Truffle artifact (`{"abi": [...]}`) or a bare ABI array.
    pub fn parse(json: &str) -> Result<Self, ContractError> {
        let malformed =
            |err: serde_json::Error| ContractError::Binding(format!("malformed ABI: {err}"));
        let mut value: Value = serde_json::from_str(json).map_err(malformed)?;
        let items = if value.get("abi").is_some() {
            value["abi"].take()
        } else {
            value
        };
        let inner = serde_json::from_value(items).map_err(malformed)?;
        Ok(Self { inner })
    }

    pub fn function(&self, name: &str) -> Option<&alloy_json_abi::Function> {
        self.inner.function(name).and_then(|overloads| overloads.first())
    }

    /// Resolve `name` into a callable [`Function`], checking it takes
    /// `inputs` unsigned integers and returns `outputs` unsigned integers.
    pub fn uint_function(
        &self,
        name: &str,
        inputs: usize,
        outputs: usize,
    ) -> Result<Function, ContractError> {
        let item = self
            .function(name)
            .ok_or_else(|| ContractError::Binding(format!("ABI has no function `{name}`")))?;

        if item.inputs.len() != inputs || item.outputs.len() != outputs {
            return Err(ContractError::Binding(format!(
                "`{name}` must take {inputs} argument(s) and return {outputs} value(s)"
            )));
        }

        let bits_of = |param: &Param| {
            uint_bits(&param.ty).ok_or_else(|| {
                ContractError::Binding(format!("`{name}` uses unsupported type `{}`", param.ty))
            })
        };
        for param in &item.outputs {
            bits_of(param)?;
        }
        let arg_bits = item
            .inputs
            .iter()
            .map(bits_of)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Function {
            name: item.name.clone(),
            signature: item.signature(),
            selector: item.selector(),
            arg_bits,
        })
    }
}

/// A resolved contract function with its selector.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub signature: String,
    pub selector: Selector,
    arg_bits: Vec<usize>,
}

impl Function {
    /// `0x`-prefixed call data for this function applied to `args`.
    pub fn encode_call(&self, args: &[U256]) -> Result<String, ContractError> {
        if args.len() != self.arg_bits.len() {
            return Err(ContractError::Binding(format!(
                "`{}` expects {} argument(s), got {}",
                self.signature,
                self.arg_bits.len(),
                args.len()
            )));
        }

        let mut data = Vec::with_capacity(4 + 32 * args.len());
        data.extend_from_slice(self.selector.as_slice());
        for (value, bits) in args.iter().zip(&self.arg_bits) {
            if value.bit_len() > *bits {
                return Err(ContractError::AmountOutOfRange {
                    amount: *value,
                    ty: format!("uint{bits}"),
                });
            }
            data.extend_from_slice(&value.to_be_bytes::<32>());
        }
        Ok(hex::encode_prefixed(data))
    }
}

/// First four bytes of keccak-256 over a canonical signature.
pub fn selector(signature: &str) -> Selector {
    Selector::from_slice(&keccak256(signature)[..4])
}

/// Bit width of `uintN`, or `None` for anything else.
fn uint_bits(ty: &str) -> Option<usize> {
    let bits: usize = ty.strip_prefix("uint")?.parse().ok()?;
    (bits % 8 == 0 && (8..=256).contains(&bits)).then_some(bits)
}

/// Decode the first ABI word of `0x` return data.
pub fn decode_uint(data: &str) -> Result<U256, ContractError> {
    let bytes = hex::decode(data)
        .map_err(|err| ContractError::RemoteCall(format!("invalid return data {data:?}: {err}")))?;
    if bytes.is_empty() {
        return Err(ContractError::RemoteCall(
            "empty return data (is the contract deployed at this address?)".to_owned(),
        ));
    }
    let Some(word) = bytes.get(..32) else {
        return Err(ContractError::RemoteCall(format!(
            "return data too short: {} bytes",
            bytes.len()
        )));
    };
    Ok(U256::from_be_slice(word))
}

/// Parse a `0x` quantity such as a block number or receipt status.
pub fn parse_quantity(raw: &str) -> Option<u64> {
    let digits = raw.strip_prefix("0x")?;
    if digits.is_empty() {
        return Some(0);
    }
    u64::from_str_radix(digits, 16).ok()
}
