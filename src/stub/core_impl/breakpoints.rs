use super::prelude::*;

impl<'a, T: Target, C: Connection> RdbStubImpl<'a, T, C> {
    pub(crate) fn handle_bp(
        &mut self,
        target: &mut T,
        args: &Args<'_>,
    ) -> Result<HandlerStatus, Error<C::Error>> {
        let ops = match target.support_breakpoints() {
            Some(ops) => ops,
            None => return Err(Error::reject("bp: breakpoints not supported")),
        };

        if ops.add(args.as_raw()) {
            Ok(HandlerStatus::NeedsOk)
        } else {
            Err(Error::reject("bp: expression rejected"))
        }
    }

    /// Breakpoints are listed with their 1-based indices implied by order.
    pub(crate) fn handle_bplist(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
        target: &mut T,
    ) -> Result<HandlerStatus, Error<C::Error>> {
        res.write_str("OK")?;
        res.write_sep()?;

        let ops = match target.support_breakpoints() {
            Some(ops) => ops,
            None => {
                res.write_num(0u8)?;
                res.write_sep()?;
                return Ok(HandlerStatus::Handled);
            }
        };

        let list: Vec<_> = (1..=ops.count()).filter_map(|i| ops.info(i)).collect();
        res.write_num(list.len())?;
        res.write_sep()?;

        for info in list.iter() {
            // the expression may contain spaces, but never a separator
            res.write_str(&info.expression)?;
            res.write_sep()?;
            res.write_num(info.ccount)?;
            res.write_sep()?;
            res.write_num(info.hits)?;
            res.write_sep()?;
            res.write_bool(info.once)?;
            res.write_sep()?;
            res.write_bool(info.quiet)?;
            res.write_sep()?;
            res.write_bool(info.trace)?;
            res.write_sep()?;
        }

        Ok(HandlerStatus::Handled)
    }

    pub(crate) fn handle_bpdel(
        &mut self,
        target: &mut T,
        args: &Args<'_>,
    ) -> Result<HandlerStatus, Error<C::Error>> {
        let index = match args.as_split().first() {
            Some(arg) => TargetEval::new(target).eval(arg)?,
            None => return Err(Error::reject("bpdel: expected <index>")),
        };

        let ops = match target.support_breakpoints() {
            Some(ops) => ops,
            None => return Err(Error::reject("bpdel: breakpoints not supported")),
        };

        if ops.remove(index as usize) {
            Ok(HandlerStatus::NeedsOk)
        } else {
            Err(Error::reject(format_args!("bpdel: no breakpoint {}", index)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::*;

    #[test]
    fn add_list_remove() {
        let mut target = MockTarget::new();
        let mut stub = stub();

        assert_eq!(run(&mut stub, &mut target, "bplist"), b"OK\x010\x01\0");

        assert_eq!(run(&mut stub, &mut target, "bp pc = $e00030 : once"), b"OK\0");
        assert_eq!(run(&mut stub, &mut target, "bp d0 = 1"), b"OK\0");
        assert_eq!(target.breakpoints, ["pc = $e00030 : once", "d0 = 1"]);

        assert_eq!(
            run(&mut stub, &mut target, "bplist"),
            &b"OK\x012\x01\
               pc = $e00030 : once\x010\x012\x011\x010\x010\x01\
               d0 = 1\x010\x012\x010\x010\x010\x01\0"[..]
        );

        assert_eq!(run(&mut stub, &mut target, "bpdel 1"), b"OK\0");
        assert_eq!(target.breakpoints, ["d0 = 1"]);
        assert_eq!(run(&mut stub, &mut target, "bpdel 2"), b"NG\0");
        assert_eq!(run(&mut stub, &mut target, "bpdel 0"), b"NG\0");
        assert_eq!(run(&mut stub, &mut target, "bpdel"), b"NG\0");
    }

    #[test]
    fn bp_rejected_by_manager() {
        let mut target = MockTarget::new();
        let mut stub = stub();
        assert_eq!(run(&mut stub, &mut target, "bp   "), b"NG\0");
        assert_eq!(run(&mut stub, &mut target, "bp"), b"NG\0");
        assert!(target.breakpoints.is_empty());
    }

    #[test]
    fn count_matches_listed_breakpoints() {
        let mut target = MockTarget::new();
        let mut stub = stub();
        target.breakpoints.push("a0 = 4".into());
        target.overcount = 3;
        assert_eq!(
            run(&mut stub, &mut target, "bplist"),
            b"OK\x011\x01a0 = 4\x010\x012\x010\x010\x010\x01\0"
        );
    }
}
