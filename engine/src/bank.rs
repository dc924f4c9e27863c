use crate::{
    render,
    session::Doc,
    transport::{Actor, Interaction},
    Engine, EngineError,
};

impl Engine {
    /// Shows the invoker's balance, opening the account on first use.
    pub(crate) async fn balance(&self, ctx: &Interaction) -> Result<(), EngineError> {
        let now = self.now();
        self.update_guild(ctx, &[Doc::Economy], |session| {
            let ledger = &mut session.state.ledger;
            let account = ledger.get_or_create(ctx.user.id, &ctx.user.name, now).clone();
            Ok(render::balance(&account, &ledger.bank_name, &ledger.currency))
        })
        .await
    }

    /// Both sides must already hold accounts.
    pub(crate) async fn transfer(&self, ctx: &Interaction, to: Actor, amount: u64) -> Result<(), EngineError> {
        self.update_guild(ctx, &[Doc::Economy], |session| {
            let ledger = &mut session.state.ledger;
            ledger.transfer(ctx.user.id, to.id, amount)?;
            log::info!("{} sent {amount} to {}", ctx.user.name, to.name);
            Ok(render::transferred(&ctx.user.name, &to.name, amount, &ledger.currency))
        })
        .await
    }

    pub(crate) async fn set_balance(&self, ctx: &Interaction, target: Actor, amount: u64) -> Result<(), EngineError> {
        let now = self.now();
        self.update_guild(ctx, &[Doc::Economy], |session| {
            let ledger = &mut session.state.ledger;
            ledger.get_or_create(target.id, &target.name, now);
            ledger.set_balance(target.id, amount)?;
            log::info!("{} set {}'s balance to {amount}", ctx.user.name, target.name);
            Ok(render::balance_set(&target.name, amount, &ledger.currency))
        })
        .await
    }

    pub(crate) async fn leaderboard(&self, ctx: &Interaction, limit: usize) -> Result<(), EngineError> {
        self.update_guild(ctx, &[], |session| {
            let ledger = &session.state.ledger;
            Ok(render::leaderboard(
                &ledger.leaderboard(limit),
                &ledger.bank_name,
                &ledger.currency,
            ))
        })
        .await
    }
}
