use super::prelude::*;

impl<'a, T: Target, C: Connection> RdbStubImpl<'a, T, C> {
    pub(crate) fn handle_symlist(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
        target: &mut T,
    ) -> Result<HandlerStatus, Error<C::Error>> {
        res.write_str("OK")?;
        res.write_sep()?;

        let ops = match target.support_symbols() {
            Some(ops) => ops,
            None => {
                res.write_num(0u8)?;
                res.write_sep()?;
                return Ok(HandlerStatus::Handled);
            }
        };

        // the count must match what is sent, even if the table shrinks
        let symbols: Vec<_> = (0..ops.count()).map_while(|i| ops.symbol(i)).collect();
        res.write_num(symbols.len())?;
        res.write_sep()?;

        for sym in symbols.iter() {
            res.write_str(&sym.name)?;
            res.write_sep()?;
            res.write_num(sym.address)?;
            res.write_sep()?;
            res.write_char(sym.kind)?;
            res.write_sep()?;
        }

        Ok(HandlerStatus::Handled)
    }
}
