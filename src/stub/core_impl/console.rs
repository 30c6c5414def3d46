use log::*;

use super::prelude::*;
use crate::target::ext::console::ConsoleOutcome;

impl<'a, T: Target, C: Connection> RdbStubImpl<'a, T, C> {
    /// Run one line through the target's command-line console. The line's
    /// effect on execution, and whatever it printed, are reported as
    /// notifications ahead of the response.
    pub(crate) fn handle_console(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
        target: &mut T,
        args: &Args<'_>,
    ) -> Result<HandlerStatus, Error<C::Error>> {
        let ops = match target.support_console() {
            Some(ops) => ops,
            None => return Err(Error::reject("console: no console")),
        };

        if let ConsoleOutcome::EndSession = ops.parse(args.as_raw()) {
            debug!("console command resumed execution");
            self.break_active = false;
        }

        self.notify_status(res, target)?;
        self.notify_log(res)?;
        Ok(HandlerStatus::NeedsOk)
    }
}
