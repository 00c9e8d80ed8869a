// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Splits an ordered, mixed-kind sequence into maximal runs of one kind.
//!
//! The actor pulls messages of every kind off its inbox in one receive, but
//! each kind has its own handler. Batching contiguous runs keeps arrival
//! order intact while letting a handler see as many messages at once as
//! possible.
//!
//! ```text
//! [Log, Log, Publish, Log, Log, Close]
//!   -> ([Log, Log], Log) ([Publish], Publish) ([Log, Log], Log) ([Close], Close)
//! ```

use std::fmt;
use std::iter::Peekable;
use std::vec::IntoIter;

/// Anything with a runtime kind that batches are split on.
pub trait Kinded {
    type Kind: Copy + Eq + fmt::Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

/// Takes the leading run of same-kind items.
///
/// Returns the run, its kind and the untouched remainder. An empty input
/// yields `(vec![], None, vec![])`.
pub fn get_like_items<T: Kinded>(mut items: Vec<T>) -> (Vec<T>, Option<T::Kind>, Vec<T>) {
    let Some(kind) = items.first().map(Kinded::kind) else {
        return (Vec::new(), None, items);
    };

    let end = items
        .iter()
        .position(|item| item.kind() != kind)
        .unwrap_or(items.len());
    let rest = items.split_off(end);
    (items, Some(kind), rest)
}

/// Lazily yields every maximal same-kind run of `items`, in order.
pub fn type_batched_items<T: Kinded>(items: Vec<T>) -> TypeBatches<T> {
    TypeBatches {
        items: items.into_iter().peekable(),
    }
}

/// Iterator returned by [`type_batched_items`].
pub struct TypeBatches<T: Kinded> {
    items: Peekable<IntoIter<T>>,
}

impl<T: Kinded> Iterator for TypeBatches<T> {
    type Item = (Vec<T>, T::Kind);

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.items.next()?;
        let kind = first.kind();

        let mut batch = vec![first];
        while let Some(item) = self.items.next_if(|item| item.kind() == kind) {
            batch.push(item);
        }
        Some((batch, kind))
    }
}
