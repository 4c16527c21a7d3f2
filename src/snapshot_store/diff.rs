use std::collections::HashMap;

use super::{Op, OpKind};

/// Computes the ops that turn `store` into `fresh`.
///
/// Deletions come first, then keys whose value changed, both in `store`
/// iteration order, then keys only present in `fresh`, in `fresh` iteration
/// order. New keys are reported as [`OpKind::Update`]. Values are compared
/// with `PartialEq`; unchanged keys produce nothing.
pub fn diff_maps<V>(store: &HashMap<String, V>, fresh: &HashMap<String, V>) -> Vec<Op<V>>
where
    V: Clone + PartialEq,
{
    let mut ops = Vec::new();
    let mut modified = Vec::new();

    for (key, old_value) in store {
        match fresh.get(key) {
            None => ops.push(Op::delete(key.clone(), old_value.clone())),
            Some(new_value) if new_value != old_value => {
                modified.push(Op::update(key.clone(), new_value.clone()));
            }
            Some(_) => {}
        }
    }

    ops.append(&mut modified);
    ops.extend(
        fresh
            .iter()
            .filter(|(key, _)| !store.contains_key(key.as_str()))
            .map(|(key, value)| Op::update(key.clone(), value.clone())),
    );

    ops
}

/// Applies `ops` to `store` in order.
pub fn apply_ops<V: Clone>(store: &mut HashMap<String, V>, ops: &[Op<V>]) {
    for op in ops {
        match op.kind {
            OpKind::Delete => {
                store.remove(&op.key);
            }
            OpKind::Create | OpKind::Update => {
                store.insert(op.key.clone(), op.value.clone());
            }
        }
    }
}

/// Brings `store` in line with `fresh` and returns the ops that did it.
///
/// The whole change-set is computed before `store` is touched, so a panic
/// while comparing values leaves it as it was.
pub(crate) fn reconcile<V>(store: &mut HashMap<String, V>, fresh: &HashMap<String, V>) -> Vec<Op<V>>
where
    V: Clone + PartialEq,
{
    let ops = diff_maps(store, fresh);
    apply_ops(store, &ops);
    ops
}
