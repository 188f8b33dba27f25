use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub label: &'static str,
    pub description: &'static str,
}

pub const TOKEN_STAGES: &[Stage] = &[
    Stage { label: "Initialisation", description: "preparing token creation" },
    Stage { label: "Create mint account", description: "allocating the mint on chain" },
    Stage { label: "Initialise mint", description: "setting decimals and authorities" },
    Stage { label: "Create token account", description: "opening the account that receives the supply" },
    Stage { label: "Mint initial supply", description: "minting the total supply" },
    Stage { label: "Create metadata", description: "writing name, symbol and URI" },
    Stage { label: "Finalisation", description: "confirming the transaction" },
];

pub const POOL_STAGES: &[Stage] = &[
    Stage { label: "Initialisation", description: "preparing pool creation" },
    Stage { label: "Verify token", description: "checking the token mint" },
    Stage { label: "Create pool", description: "initialising the pool on the DEX" },
    Stage { label: "Add liquidity", description: "depositing the token and SOL" },
    Stage { label: "Finalisation", description: "confirming the transaction" },
];

pub struct Progress {
    name: &'static str,
    stages: &'static [Stage],
    current: usize,
}

impl Progress {
    pub fn token() -> Self {
        Self { name: "token", stages: TOKEN_STAGES, current: 0 }
    }

    pub fn pool() -> Self {
        Self { name: "pool", stages: POOL_STAGES, current: 0 }
    }

    /// Moves to `stage` (0-based). Stages never go backwards; an index past
    /// the end is clamped to the last stage.
    pub fn advance(&mut self, stage: usize) {
        let stage = stage.min(self.stages.len() - 1).max(self.current);
        self.current = stage;
        let s = self.stages[stage];
        info!(
            "[{} {}/{}] {}: {}",
            self.name,
            stage + 1,
            self.stages.len(),
            s.label,
            s.description
        );
    }

    pub fn current(&self) -> Stage {
        self.stages[self.current]
    }

    pub fn is_done(&self) -> bool {
        self.current + 1 == self.stages.len()
    }
}
