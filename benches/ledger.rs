use std::collections::HashSet;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use dealer_credits::import::deduplicate;
use dealer_credits::{AccountId, Credits, Ledger, LedgerCommand, MemoryStore, NewAccount, NewTransfer};
use tokio::runtime::Runtime;

/// Generates a master account, `num_dealers` dealers under it, then
/// `transfers_per_dealer` top-ups per dealer in round-robin order.
///
/// The master is granted exactly enough credit for every transfer to apply.
pub struct CommandGenerator {
    num_dealers: AccountId,
    transfers_per_dealer: u32,
    opened: AccountId,
    sent: u64,
}

impl CommandGenerator {
    const MASTER: AccountId = 1;

    pub fn new(num_dealers: AccountId, transfers_per_dealer: u32) -> Self {
        Self {
            num_dealers,
            transfers_per_dealer,
            opened: 0,
            sent: 0,
        }
    }

    fn total_transfers(&self) -> u64 {
        self.num_dealers as u64 * self.transfers_per_dealer as u64
    }
}

impl Iterator for CommandGenerator {
    type Item = LedgerCommand;

    fn next(&mut self) -> Option<Self::Item> {
        if self.opened == 0 {
            self.opened = 1;
            let total = self.total_transfers();
            return Some(LedgerCommand::Open(NewAccount::new(
                Self::MASTER,
                Credits::new(total * 10, total * 2),
            )));
        }

        if self.opened <= self.num_dealers {
            let dealer = Self::MASTER + self.opened;
            self.opened += 1;
            return Some(LedgerCommand::Open(
                NewAccount::new(dealer, Credits::ZERO).with_parent(Self::MASTER),
            ));
        }

        if self.sent >= self.total_transfers() {
            return None;
        }

        let dealer = Self::MASTER + 1 + (self.sent % self.num_dealers as u64) as AccountId;
        self.sent += 1;
        Some(LedgerCommand::Transfer(NewTransfer {
            from: Self::MASTER,
            to: dealer,
            amount: Credits::new(10, 2),
            note: None,
        }))
    }
}

fn bench_transfers(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("transfers");

    for (dealers, per_dealer) in [(10, 1_000), (1_000, 10)] {
        let label = format!("{dealers}d_{per_dealer}tx");
        group.bench_with_input(
            BenchmarkId::from_parameter(&label),
            &(dealers, per_dealer),
            |b, &(dealers, per_dealer)| {
                b.to_async(&runtime).iter(|| async move {
                    let ledger = Ledger::new(Arc::new(MemoryStore::new()));
                    for command in CommandGenerator::new(dealers, per_dealer) {
                        let _ = black_box(ledger.apply(command).await);
                    }
                    ledger
                });
            },
        );
    }

    group.finish();
}

fn bench_deduplicate(c: &mut Criterion) {
    let mut group = c.benchmark_group("deduplicate");

    for count in [1_000usize, 100_000] {
        // every fourth number repeats, every tenth already exists
        let numbers: Vec<String> = (0..count).map(|i| format!("5{:09}", i - i % 4 / 3)).collect();
        let existing: HashSet<String> = (0..count).step_by(10).map(|i| format!("5{i:09}")).collect();

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| black_box(deduplicate(numbers.clone(), &existing)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_transfers, bench_deduplicate);
criterion_main!(benches);
