use super::prelude::*;
use crate::protocol::atoi;

/// The single argument of `profile` / `ffwd`, with C `atoi` semantics.
fn single_int(args: &Args<'_>) -> Option<i32> {
    match args.as_split() {
        [arg] => Some(atoi(arg)),
        _ => None,
    }
}

impl<'a, T: Target, C: Connection> RdbStubImpl<'a, T, C> {
    /// Sets the mask when given an expression, and always replies with the
    /// current mask.
    pub(crate) fn handle_exmask(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
        target: &mut T,
        args: &Args<'_>,
    ) -> Result<HandlerStatus, Error<C::Error>> {
        if target.support_exception_mask().is_none() {
            return Err(Error::reject("exmask: not supported"));
        }

        let new_mask = match args.as_split() {
            [expr] => Some(TargetEval::new(target).eval(expr)?),
            _ => None,
        };

        let ops = match target.support_exception_mask() {
            Some(ops) => ops,
            None => return Err(Error::reject("exmask: not supported")),
        };
        if let Some(mask) = new_mask {
            ops.set_exception_mask(mask);
        }

        res.write_str("OK")?;
        res.write_sep()?;
        res.write_num(ops.exception_mask())?;
        Ok(HandlerStatus::Handled)
    }

    pub(crate) fn handle_infoym(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
        target: &mut T,
    ) -> Result<HandlerStatus, Error<C::Error>> {
        let regs = match target.support_info_ym() {
            Some(ops) => ops.ym_registers(),
            None => return Err(Error::reject("infoym: not supported")),
        };

        res.write_str("OK")?;
        for val in regs.iter() {
            res.write_sep()?;
            res.write_num(*val)?;
        }
        Ok(HandlerStatus::Handled)
    }

    pub(crate) fn handle_profile(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
        target: &mut T,
        args: &Args<'_>,
    ) -> Result<HandlerStatus, Error<C::Error>> {
        let enable = single_int(args).ok_or_else(|| Error::reject("profile: expected <n>"))?;
        let ops = match target.support_profiler() {
            Some(ops) => ops,
            None => return Err(Error::reject("profile: not supported")),
        };

        ops.set_profiler_enabled(enable != 0);

        res.write_str("OK")?;
        res.write_sep()?;
        res.write_num(enable as u32)?;
        Ok(HandlerStatus::Handled)
    }

    pub(crate) fn handle_reset(
        &mut self,
        target: &mut T,
        cold: bool,
    ) -> Result<HandlerStatus, Error<C::Error>> {
        let ops = match target.support_reset() {
            Some(ops) => ops,
            None => return Err(Error::reject("reset: not supported")),
        };

        let ok = if cold {
            ops.reset_cold()
        } else {
            ops.reset_warm()
        };
        if ok {
            Ok(HandlerStatus::NeedsOk)
        } else {
            Err(Error::reject("reset failed"))
        }
    }

    /// The new state is also reported as a status notification, sent ahead
    /// of the response.
    pub(crate) fn handle_ffwd(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
        target: &mut T,
        args: &Args<'_>,
    ) -> Result<HandlerStatus, Error<C::Error>> {
        let enable = single_int(args).ok_or_else(|| Error::reject("ffwd: expected <n>"))?;
        target.set_fast_forward(enable != 0);

        self.notify_status(res, target)?;

        res.write_str("OK")?;
        res.write_sep()?;
        res.write_num(enable as u32)?;
        Ok(HandlerStatus::Handled)
    }
}
