mod test_composer;
