// Copyright 2024 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use alloy_primitives::{Address, Bytes, U256};
use proptest::{collection::vec, prelude::*};
use sigcheck_core::{
    build_unsigned_message,
    rlp::{decode, encode_list, RlpItem},
    ChainContext, TransactionFields, TransactionKind,
};

fn arb_item() -> impl Strategy<Value = RlpItem> {
    let leaf = vec(any::<u8>(), 0..80).prop_map(RlpItem::bytes);
    leaf.prop_recursive(3, 64, 8, |inner| vec(inner, 0..8).prop_map(RlpItem::List))
}

fn arb_fields() -> impl Strategy<Value = TransactionFields> {
    (
        any::<u64>(),
        any::<[u8; 32]>(),
        any::<u64>(),
        proptest::option::of(any::<[u8; 20]>()),
        any::<[u8; 32]>(),
        vec(any::<u8>(), 0..200),
    )
        .prop_map(|(nonce, gas_price, gas_limit, to, value, data)| TransactionFields {
            nonce,
            gas_price: U256::from_be_bytes(gas_price),
            gas_limit: U256::from(gas_limit),
            to: to.map(Address::from).into(),
            value: U256::from_be_bytes(value),
            data: Bytes::from(data),
        })
}

proptest! {
    #[test]
    fn list_round_trip(items in vec(arb_item(), 0..16)) {
        prop_assert_eq!(decode(&encode_list(&items)).unwrap(), items);
    }

    #[test]
    fn fields_round_trip(fields in arb_fields(), chain_id in proptest::option::of(any::<u64>())) {
        let message = build_unsigned_message(&fields, ChainContext::from(chain_id));
        let items = decode(message.as_bytes()).unwrap();
        prop_assert_eq!(items.len(), if chain_id.is_some() { 9 } else { 6 });
        prop_assert_eq!(TransactionFields::from_rlp_items(&items).unwrap(), fields);
    }

    #[test]
    fn build_is_deterministic(fields in arb_fields(), chain_id in any::<u64>()) {
        let chain = ChainContext::eip155(chain_id);
        prop_assert_eq!(
            build_unsigned_message(&fields, chain),
            build_unsigned_message(&fields.clone(), chain)
        );
    }
}

#[test]
fn create_round_trip() {
    let fields = TransactionFields {
        to: TransactionKind::Create,
        ..Default::default()
    };
    let message = build_unsigned_message(&fields, ChainContext::legacy());
    assert_eq!(message.as_bytes(), [0xc6, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80]);
}
