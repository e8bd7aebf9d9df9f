//! Per-family index mappings.

use aergo_index_store::Family;
use serde_json::{json, Value};

/// Index-creation body for `family`.
pub(crate) fn index_body(family: Family) -> Value {
    let properties = match family {
        Family::Block => json!({
            "id": { "type": "keyword" },
            "ts": { "type": "date" },
            "no": { "type": "long" },
            "size": { "type": "long" },
            "txs": { "type": "long" }
        }),
        Family::Tx => json!({
            "id": { "type": "keyword" },
            "ts": { "type": "date" },
            "blockno": { "type": "long" },
            "from": { "type": "keyword" },
            "to": { "type": "keyword" },
            "amount": { "type": "keyword" },
            "type": { "type": "long" }
        }),
        Family::Name => json!({
            "id": { "type": "keyword" },
            "name": { "type": "keyword" },
            "address": { "type": "keyword" },
            "blockno": { "type": "long" },
            "update_block": { "type": "long" }
        }),
    };
    json!({ "mappings": { "properties": properties } })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_field_is_mapped_long() {
        for family in Family::ALL {
            let body = index_body(family);
            let field = &body["mappings"]["properties"][family.ordering_field()];
            assert_eq!(field["type"], "long", "{family}");
        }
    }
}
