mod test_relay_without_partner;
